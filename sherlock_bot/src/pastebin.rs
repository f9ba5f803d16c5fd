use async_trait::async_trait;
use sherlock_core::paste::{PasteError, PasteOptions, PasteRegistry, Pastebin};

use crate::config::{ConfigError, PasteServiceConfig};

/// A pastebin that takes a form POST of the paste and redirects to its page
pub struct FormPastebin {
    client: reqwest::Client,
    url: String,
}

impl FormPastebin {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Pastebin for FormPastebin {
    async fn paste(&self, text: &str, options: &PasteOptions) -> Result<String, PasteError> {
        let form = [
            ("text", text),
            ("expire", options.expire.as_str()),
            ("lang", options.lang.as_str()),
            ("password", options.password.as_str()),
        ];

        let response = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| PasteError::Service(format!("Connection error occurred: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PasteError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown error").to_owned(),
            });
        }

        // Redirects have been followed, so this is the paste's own page
        Ok(response.url().to_string())
    }
}

/// Build the set of configured paste services, in configuration order
pub fn build_registry(services: &[PasteServiceConfig]) -> Result<PasteRegistry, ConfigError> {
    let client = reqwest::Client::new();
    let mut registry = PasteRegistry::new();

    for service in services {
        registry
            .register(
                service.name.clone(),
                Box::new(FormPastebin::new(client.clone(), service.url.clone())),
            )
            .map_err(|_| ConfigError::DuplicatePasteService(service.name.clone()))?;
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_in_configured_order() {
        let services = [
            PasteServiceConfig {
                name: "first".to_owned(),
                url: "https://one.example/new".to_owned(),
            },
            PasteServiceConfig {
                name: "second".to_owned(),
                url: "https://two.example/new".to_owned(),
            },
        ];

        let registry = build_registry(&services).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let service = PasteServiceConfig {
            name: "same".to_owned(),
            url: "https://one.example/new".to_owned(),
        };

        assert!(matches!(
            build_registry(&[service.clone(), service]),
            Err(ConfigError::DuplicatePasteService(name)) if name == "same"
        ));
    }
}
