//! Named pastebin services, used to publish results too long for a channel.

use async_trait::async_trait;
use rand::prelude::*;
use thiserror::Error;

const PASSWORD_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*(),./";
const PASSWORD_LENGTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Attempt to register duplicate item '{0}'")]
    DuplicateEntry(String),
}

/// A set of items identified by name, kept in registration order
#[derive(Debug)]
pub struct Registry<T> {
    items: Vec<(String, T)>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, item: T) -> Result<(), RegistryError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(RegistryError::DuplicateEntry(name));
        }
        self.items.push((name, item));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.items.iter().find(|(n, _)| n == name).map(|(_, item)| item)
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        let index = self.items.iter().position(|(n, _)| n == name)?;
        Some(self.items.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items.iter().map(|(name, item)| (name.as_str(), item))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum PasteError {
    #[error("[HTTP {status}] {message}")]
    Http { status: u16, message: String },
    #[error("{0}")]
    Service(String),
    #[error("Unable to paste data")]
    NoPasteAvailable,
}

/// Settings for a single paste
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteOptions {
    pub expire: String,
    pub lang: String,
    pub password: String,
}

impl PasteOptions {
    /// One-hour plain text paste behind a fresh random password
    pub fn new() -> Self {
        Self {
            expire: "1h".to_owned(),
            lang: "text".to_owned(),
            password: random_password(),
        }
    }
}

impl Default for PasteOptions {
    fn default() -> Self {
        Self::new()
    }
}

pub fn random_password() -> String {
    let mut rng = rand::thread_rng();
    (0..PASSWORD_LENGTH)
        .map(|_| char::from(PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())]))
        .collect()
}

#[async_trait]
pub trait Pastebin: Send + Sync {
    /// Publish `text` and return its URL
    async fn paste(&self, text: &str, options: &PasteOptions) -> Result<String, PasteError>;
}

pub type PasteRegistry = Registry<Box<dyn Pastebin>>;

/// Paste `text` to the preferred service, falling back to every other registered
/// service in turn
pub async fn paste(
    registry: &PasteRegistry,
    preferred: Option<&str>,
    text: &str,
    options: &PasteOptions,
) -> Result<String, PasteError> {
    let first = preferred.and_then(|name| registry.get(name).map(|bin| (name, bin)));
    let others = registry
        .iter()
        .filter(|(name, _)| Some(*name) != preferred);

    for (name, bin) in first.into_iter().chain(others) {
        match bin.paste(text, options).await {
            Ok(url) => return Ok(url),
            Err(error) => tracing::warn!(service = name, %error, "Paste failed"),
        }
    }

    Err(PasteError::NoPasteAvailable)
}
