//! Recognition of server notices that announce connecting clients and nick changes.

use crate::config::NoticeRegexConfig;

use regex::{Captures, Regex};
use thiserror::Error;

/// The kinds of server notice that are tracked, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NoticeKind {
    Nick,
    Connect,
}

impl NoticeKind {
    /// Capture groups that a pattern for this kind of notice must define
    pub fn required_groups(&self) -> &'static [&'static str] {
        match self {
            Self::Nick => &["oldnick", "newnick"],
            Self::Connect => &["nick", "ident", "host", "addr"],
        }
    }
}

/// A recognised server notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerNotice {
    NickChange {
        old_nick: String,
        new_nick: String,
    },
    Connect {
        nick: String,
        ident: String,
        host: String,
        addr: String,
    },
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid {kind} notice pattern: {source}")]
    Invalid {
        kind: NoticeKind,
        #[source]
        source: regex::Error,
    },
    #[error("{kind} notice pattern has no capture group named '{group}'")]
    MissingGroup {
        kind: NoticeKind,
        group: &'static str,
    },
}

/// The compiled notice patterns for a session
#[derive(Debug, Clone)]
pub struct NoticePatterns {
    patterns: Vec<(NoticeKind, Regex)>,
}

fn compile(kind: NoticeKind, pattern: &str) -> Result<Regex, PatternError> {
    // Patterns match from the start of the notice text, but needn't consume all of it
    let regex = Regex::new(&format!("^(?:{pattern})"))
        .map_err(|source| PatternError::Invalid { kind, source })?;

    for &group in kind.required_groups() {
        if !regex.capture_names().flatten().any(|name| name == group) {
            return Err(PatternError::MissingGroup { kind, group });
        }
    }

    Ok(regex)
}

impl NoticePatterns {
    pub fn compile(config: &NoticeRegexConfig) -> Result<Self, PatternError> {
        Ok(Self {
            patterns: vec![
                (NoticeKind::Nick, compile(NoticeKind::Nick, &config.nick)?),
                (NoticeKind::Connect, compile(NoticeKind::Connect, &config.connect)?),
            ],
        })
    }

    /// Match a notice against each pattern in turn. The first pattern to match wins.
    pub fn match_notice(&self, text: &str) -> Option<ServerNotice> {
        self.patterns.iter().find_map(|(kind, regex)| {
            let captures = regex.captures(text)?;
            let notice = build_notice(*kind, &captures);
            if notice.is_none() {
                tracing::debug!(%kind, text, "Notice matched without all required groups");
            }
            notice
        })
    }
}

fn build_notice(kind: NoticeKind, captures: &Captures) -> Option<ServerNotice> {
    let group = |name: &str| captures.name(name).map(|m| m.as_str().to_owned());

    match kind {
        NoticeKind::Nick => Some(ServerNotice::NickChange {
            old_nick: group("oldnick")?,
            new_nick: group("newnick")?,
        }),
        NoticeKind::Connect => Some(ServerNotice::Connect {
            nick: group("nick")?,
            ident: group("ident")?,
            host: group("host")?,
            addr: group("addr")?,
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn charybdis_patterns() -> NoticeRegexConfig {
        NoticeRegexConfig {
            nick: r"\*\*\* Notice -- Nick change: From (?P<oldnick>\S+) to (?P<newnick>\S+)"
                .to_owned(),
            connect: r"\*\*\* Notice -- Client connecting: (?P<nick>\S+) \((?P<ident>[^@]+)@(?P<host>[^)]+)\) \[(?P<addr>[^\]]+)\]"
                .to_owned(),
        }
    }

    #[test]
    fn matches_connect_notice() {
        let patterns = NoticePatterns::compile(&charybdis_patterns()).unwrap();

        let notice = patterns.match_notice(
            "*** Notice -- Client connecting: Alice (~alice@h1) [1.2.3.4] {users} [Alice A]",
        );

        assert_eq!(
            notice,
            Some(ServerNotice::Connect {
                nick: "Alice".to_owned(),
                ident: "~alice".to_owned(),
                host: "h1".to_owned(),
                addr: "1.2.3.4".to_owned(),
            })
        );
    }

    #[test]
    fn matches_nick_change_notice() {
        let patterns = NoticePatterns::compile(&charybdis_patterns()).unwrap();

        let notice =
            patterns.match_notice("*** Notice -- Nick change: From Bob to Bobby [bob@h1]");

        assert_eq!(
            notice,
            Some(ServerNotice::NickChange {
                old_nick: "Bob".to_owned(),
                new_nick: "Bobby".to_owned(),
            })
        );
    }

    #[test]
    fn patterns_are_anchored_at_start() {
        let patterns = NoticePatterns::compile(&charybdis_patterns()).unwrap();

        assert_eq!(
            patterns.match_notice("spoof *** Notice -- Nick change: From Bob to Bobby"),
            None
        );
        assert_eq!(patterns.match_notice("*** Notice -- Client exiting: x"), None);
    }

    #[test]
    fn first_matching_pattern_wins() {
        let patterns = NoticePatterns::compile(&NoticeRegexConfig {
            nick: r"(?P<oldnick>\S+) -> (?P<newnick>\S+)".to_owned(),
            connect: r"(?P<nick>\S+) -> (?P<ident>\S*)(?P<host>\S*)(?P<addr>\S*)".to_owned(),
        })
        .unwrap();

        assert_eq!(
            patterns.match_notice("a -> b"),
            Some(ServerNotice::NickChange {
                old_nick: "a".to_owned(),
                new_nick: "b".to_owned(),
            })
        );
    }

    #[test]
    fn missing_group_is_rejected() {
        let mut config = charybdis_patterns();
        config.connect = r"Client connecting: (?P<nick>\S+) \((?P<ident>[^@]+)@(?P<host>[^)]+)\)"
            .to_owned();

        let err = NoticePatterns::compile(&config).unwrap_err();
        assert!(matches!(
            err,
            PatternError::MissingGroup {
                kind: NoticeKind::Connect,
                group: "addr"
            }
        ));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let mut config = charybdis_patterns();
        config.nick = "(unclosed".to_owned();

        assert!(matches!(
            NoticePatterns::compile(&config),
            Err(PatternError::Invalid {
                kind: NoticeKind::Nick,
                ..
            })
        ));
    }
}
