//! Configuration for the tracker and its commands

use crate::casemap::rfc_casefold;
use crate::correlator::DEFAULT_LOOKUP_TIMEOUT;
use crate::pattern::Pattern;

use serde::Deserialize;
use std::time::Duration;

/// Regular expressions used to recognise server notices.
///
/// The nick change pattern must define the groups `oldnick` and `newnick`; the connect
/// pattern must define `nick`, `ident`, `host` and `addr`.
#[derive(Debug, Clone, Deserialize)]
pub struct NoticeRegexConfig {
    pub nick: String,
    pub connect: String,
}

/// Channels in which commands are answered
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub normal: Vec<String>,
    #[serde(default)]
    pub admin: Vec<String>,
}

/// The level of detail a channel is allowed to see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAccess {
    /// Nicks and masks only
    Normal,
    /// Hosts and addresses as well
    Admin,
}

impl ChannelAccess {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl ChannelConfig {
    /// Look up the access level of `channel`, or `None` if commands aren't answered there
    pub fn access(&self, channel: &str) -> Option<ChannelAccess> {
        let channel = rfc_casefold(channel);
        let listed = |list: &[String]| list.iter().any(|c| rfc_casefold(c) == channel);

        if listed(&self.admin) {
            Some(ChannelAccess::Admin)
        } else if listed(&self.normal) {
            Some(ChannelAccess::Normal)
        } else {
            None
        }
    }

    /// Every configured channel, for joining
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.normal.iter().chain(self.admin.iter())
    }
}

fn default_command_prefix() -> String {
    ".".to_owned()
}

fn default_lookup_timeout() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT.as_secs()
}

fn default_recheck_delay() -> Option<u64> {
    Some(60)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SherlockConfig {
    pub channels: ChannelConfig,
    pub regex: NoticeRegexConfig,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Seconds to wait for a lookup reply
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout: u64,
    /// Seconds after a connect or nick change to look up the mask again, or `null` to disable
    #[serde(default = "default_recheck_delay")]
    pub recheck_delay: Option<u64>,
    /// `nick!user@host` patterns of users allowed to run admin commands
    #[serde(default)]
    pub bot_admins: Vec<Pattern>,
    /// Name of the preferred paste service for long results
    #[serde(default)]
    pub paste_service: Option<String>,
}

impl SherlockConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout)
    }

    pub fn recheck_delay(&self) -> Option<Duration> {
        self.recheck_delay.map(Duration::from_secs)
    }

    /// Whether the user with the given `nick!user@host` mask is a bot admin
    pub fn is_bot_admin(&self, mask: &str) -> bool {
        self.bot_admins.iter().any(|p| p.matches(mask))
    }
}
