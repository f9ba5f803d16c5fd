use crate::config::*;
use tracing::Subscriber;
use tracing_core::LevelFilter;
use tracing_subscriber::{filter::Targets, prelude::*, registry::LookupSpan, Layer};

use std::{collections::HashMap, path::Path};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Dependencies that log every line sent and every HTTP request at debug level.
/// Configured module levels take precedence.
const QUIET_DEPENDENCIES: &[&str] = &["irc", "hyper", "hyper_util", "reqwest", "rustls", "diesel"];

fn output_layer<S>(target: &LogTarget, dir: &Path) -> BoxedLayer<S>
where
    S: Subscriber + Send + Sync,
    for<'span> S: LookupSpan<'span>,
{
    match target {
        LogTarget::File { filename } => tracing_subscriber::fmt::layer()
            .with_writer(tracing_appender::rolling::daily(dir, filename))
            .with_ansi(false)
            .boxed(),
        LogTarget::Builtin(BuiltinLogTarget::Stdout) => {
            tracing_subscriber::fmt::layer().with_writer(std::io::stdout).boxed()
        }
        LogTarget::Builtin(BuiltinLogTarget::Stderr) => {
            tracing_subscriber::fmt::layer().with_writer(std::io::stderr).boxed()
        }
    }
}

/// What a single output accepts: everything up to its level, from its modules if
/// it names any
fn entry_filter(entry: &LogEntry) -> Targets {
    let level: LevelFilter = entry.level.map_or(LevelFilter::TRACE, Into::into);

    if entry.modules.is_empty() {
        Targets::new().with_default(level)
    } else {
        Targets::new().with_targets(entry.modules.iter().map(|module| (module.clone(), level)))
    }
}

/// The filter applied before any output sees an event
fn global_filter(conf: &LoggingConfig) -> Targets {
    let mut levels: HashMap<String, LogLevel> = QUIET_DEPENDENCIES
        .iter()
        .map(|module| (module.to_string(), LogLevel::Info))
        .collect();
    levels.extend(conf.module_levels.clone());

    Targets::new()
        .with_default(conf.default_level.unwrap_or(LogLevel::Info))
        .with_targets(levels)
}

pub fn build_subscriber(conf: &LoggingConfig) -> impl Subscriber + Send + Sync {
    let layers: Vec<_> = conf
        .targets
        .iter()
        .map(|entry| output_layer(&entry.target, &conf.dir).with_filter(entry_filter(entry)))
        .collect();

    tracing_subscriber::registry()
        .with(global_filter(conf))
        .with(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn dependencies_quiet_unless_configured() {
        let mut config = BotConfig::parse(crate::config::tests::EXAMPLE).unwrap().log;
        let filter = global_filter(&config);

        assert!(filter.would_enable("sherlock_core::tracker", &Level::DEBUG));
        assert!(!filter.would_enable("sherlock_core::tracker", &Level::TRACE));
        assert!(!filter.would_enable("reqwest::connect", &Level::DEBUG));
        assert!(filter.would_enable("reqwest::connect", &Level::INFO));

        config.module_levels.insert("reqwest".to_owned(), LogLevel::Trace);
        assert!(global_filter(&config).would_enable("reqwest::connect", &Level::TRACE));
    }

    #[test]
    fn entries_filter_by_module_and_level() {
        let entry = LogEntry {
            target: LogTarget::Builtin(BuiltinLogTarget::Stderr),
            modules: vec!["sherlock".to_owned()],
            level: Some(LogLevel::Warn),
        };
        let filter = entry_filter(&entry);

        assert!(filter.would_enable("sherlock_bot::session", &Level::WARN));
        assert!(!filter.would_enable("sherlock_bot::session", &Level::INFO));
        assert!(!filter.would_enable("irc::client", &Level::ERROR));

        let everything = entry_filter(&LogEntry {
            modules: Vec::new(),
            level: None,
            ..entry
        });
        assert!(everything.would_enable("irc::client", &Level::TRACE));
    }

    #[test]
    fn builds_from_example_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::parse(crate::config::tests::EXAMPLE).unwrap();
        let log = LoggingConfig {
            dir: dir.path().to_owned(),
            ..config.log
        };

        let subscriber = build_subscriber(&log);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Logging from a test");
        });
    }
}
