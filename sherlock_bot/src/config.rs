use serde::Deserialize;
use sherlock_core::{config::SherlockConfig, snotice::PatternError, snotice::NoticePatterns};
use std::{
    collections::HashMap,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing_core::LevelFilter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Couldn't parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("{0}")]
    Pattern(#[from] PatternError),
    #[error("Paste service '{0}' is configured more than once")]
    DuplicatePasteService(String),
}

fn default_true() -> bool {
    true
}

/// Operator credentials, needed to receive server notices
#[derive(Debug, Clone, Deserialize)]
pub struct OperConfig {
    pub name: String,
    pub password: String,
    /// Server notice mask to set once opered, e.g. `+cn`
    pub snomask: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IrcConfig {
    pub server: String,
    pub port: Option<u16>,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    pub nickname: String,
    pub username: Option<String>,
    pub realname: Option<String>,
    pub password: Option<String>,
    /// Channels to join in addition to those commands are answered in
    #[serde(default)]
    pub channels: Vec<String>,
    pub umodes: Option<String>,
    pub oper: Option<OperConfig>,
}

impl IrcConfig {
    /// Connection settings for the IRC client, joining `extra_channels` too
    pub fn client_config<'a>(
        &self,
        extra_channels: impl IntoIterator<Item = &'a String>,
    ) -> irc::client::data::Config {
        let mut channels = self.channels.clone();
        for channel in extra_channels {
            if !channels.contains(channel) {
                channels.push(channel.clone());
            }
        }

        irc::client::data::Config {
            nickname: Some(self.nickname.clone()),
            username: self.username.clone(),
            realname: self.realname.clone(),
            server: Some(self.server.clone()),
            port: self.port,
            use_tls: Some(self.use_tls),
            password: self.password.clone(),
            channels,
            umodes: self.umodes.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// Single JSON file, rewritten on every change
    Jsonfile { path: PathBuf },
    /// PostgreSQL server
    #[serde(rename_all = "kebab-case")]
    Postgres {
        url: String,
        #[serde(default = "default_true")]
        auto_run_migrations: bool,
    },
}

/// A pastebin that accepts a form POST and redirects to the new paste
#[derive(Debug, Clone, Deserialize)]
pub struct PasteServiceConfig {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinLogTarget {
    Stdout,
    Stderr,
}

/// Where one log output goes; files are rotated daily under the log directory
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum LogTarget {
    File { filename: PathBuf },
    Builtin(BuiltinLogTarget),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

/// One log output. With no `modules` it takes events from everywhere.
#[derive(Clone, Debug, Deserialize)]
pub struct LogEntry {
    pub target: LogTarget,
    #[serde(default)]
    pub modules: Vec<String>,
    pub level: Option<LogLevel>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    pub dir: PathBuf,
    /// Where stdout is redirected once running in the background
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
    pub pidfile: Option<PathBuf>,
    pub default_level: Option<LogLevel>,
    #[serde(default)]
    pub module_levels: HashMap<String, LogLevel>,
    #[serde(default)]
    pub targets: Vec<LogEntry>,
}

/// Info and above to the terminal
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("log"),
            stdout: None,
            stderr: None,
            pidfile: None,
            default_level: Some(LogLevel::Info),
            module_levels: HashMap::new(),
            targets: vec![LogEntry {
                target: LogTarget::Builtin(BuiltinLogTarget::Stdout),
                modules: Vec::new(),
                level: None,
            }],
        }
    }
}

impl LoggingConfig {
    pub fn prefix_file(&self, filename: impl AsRef<Path>) -> PathBuf {
        self.dir.join(filename)
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(arg: LogLevel) -> LevelFilter {
        match arg {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub irc: IrcConfig,
    pub database: DatabaseConfig,
    pub sherlock: SherlockConfig,
    #[serde(default)]
    pub paste: Vec<PasteServiceConfig>,
    #[serde(default)]
    pub log: LoggingConfig,
}

impl BotConfig {
    /// Load configuration from a file
    pub fn load_file<P: AsRef<Path>>(filename: P) -> Result<Self, ConfigError> {
        let mut file = File::open(filename)?;
        let mut config = String::new();
        file.read_to_string(&mut config)?;
        Self::parse(&config)
    }

    pub fn parse(config: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(config)?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked before connecting
    fn validate(&self) -> Result<(), ConfigError> {
        NoticePatterns::compile(&self.sherlock.regex)?;

        let mut names = Vec::new();
        for service in &self.paste {
            if names.contains(&&service.name) {
                return Err(ConfigError::DuplicatePasteService(service.name.clone()));
            }
            names.push(&service.name);
        }

        Ok(())
    }
}
