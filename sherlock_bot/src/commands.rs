//! Chat commands for searching recorded observations

use sherlock_core::{
    format,
    paste::PasteRegistry,
    prelude::*,
    query,
    timeparse::{LastSeen, TimeParseError},
    utils::now,
};
use std::{sync::Arc, time::Instant};

const CHECK_USAGE: &str = "<nick> [last_seen] - Looks up [nick] in the users database, optionally filtering to entries newer than [last_seen] specified in the format [-|+]5w4d3h2m1s, defaulting to forever";
const CHECKHOST_USAGE: &str = "<host|mask|addr> [last_seen] - Looks up [host|mask|addr] in the users database, optionally filtering to entries newer than [last_seen] specified in the format [-|+]5w4d3h2m1s, defaulting to forever";
const NO_PERMISSION: &str = "Sorry, you are not allowed to use this command.";

/// Where a command was issued and by whom
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// The access level of the channel the command was sent to, or `None` if it was
    /// sent privately or to a channel we don't answer in
    pub access: Option<ChannelAccess>,
    /// `nick!user@host` of the sender
    pub source_mask: String,
}

/// Split a message into a lowercased command name and its arguments, if it starts
/// with the command prefix
pub fn parse_command<'a>(prefix: &str, text: &'a str) -> Option<(String, &'a str)> {
    let text = text.strip_prefix(prefix)?;
    let (name, args) = text.split_once(' ').unwrap_or((text, ""));
    if name.is_empty() {
        return None;
    }
    Some((name.to_ascii_lowercase(), args.trim()))
}

/// First word of `args`, and the rest if there is any
fn split_query(args: &str) -> Option<(&str, Option<&str>)> {
    let args = args.trim();
    if args.is_empty() {
        return None;
    }

    Some(match args.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (args, None),
    })
}

fn bad_last_seen(text: Option<&str>, error: TimeParseError, usage: &str) -> Vec<String> {
    vec![format!(
        "Invalid last_seen '{}' ({error}). Usage: {usage}",
        text.unwrap_or_default()
    )]
}

pub struct CommandHandler {
    config: Arc<SherlockConfig>,
    store: Arc<dyn ObservationStore>,
    pastebins: Arc<PasteRegistry>,
}

impl CommandHandler {
    pub fn new(
        config: Arc<SherlockConfig>,
        store: Arc<dyn ObservationStore>,
        pastebins: Arc<PasteRegistry>,
    ) -> Self {
        Self {
            config,
            store,
            pastebins,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.config.command_prefix
    }

    /// Run a command and return the lines to send in reply. Unknown commands, and
    /// commands not allowed in this context, produce no reply.
    #[tracing::instrument(skip(self))]
    pub async fn handle(&self, context: &CommandContext, name: &str, args: &str) -> Vec<String> {
        match name {
            "check" => self.check(context, args).await,
            "checkhost" | "check2" => self.check_host(context, args).await,
            "nickstats" => self.nick_stats(context).await,
            _ => Vec::new(),
        }
    }

    async fn report(
        &self,
        query: &str,
        results: Result<query::LookupResults, StoreError>,
        admin: bool,
        started: Instant,
    ) -> Vec<String> {
        match results {
            Ok(results) => {
                format::report(
                    query,
                    &results,
                    admin,
                    started.elapsed(),
                    &self.pastebins,
                    self.config.paste_service.as_deref(),
                )
                .await
            }
            Err(error) => {
                tracing::error!(%error, query, "Search failed");
                vec!["Search failed.".to_owned()]
            }
        }
    }

    async fn check(&self, context: &CommandContext, args: &str) -> Vec<String> {
        let Some(access) = context.access else {
            return Vec::new();
        };
        let Some((nick, last_seen)) = split_query(args) else {
            return vec![CHECK_USAGE.to_owned()];
        };
        let since = match LastSeen::parse(last_seen) {
            Ok(last_seen) => last_seen.since(now()),
            Err(error) => return bad_last_seen(last_seen, error, CHECK_USAGE),
        };

        let started = Instant::now();
        let results = query::check_nick(self.store.as_ref(), nick, since).await;
        self.report(nick, results, access.is_admin(), started).await
    }

    async fn check_host(&self, context: &CommandContext, args: &str) -> Vec<String> {
        let Some(access) = context.access else {
            return Vec::new();
        };
        let Some((value, last_seen)) = split_query(args) else {
            return vec![CHECKHOST_USAGE.to_owned()];
        };
        let since = match LastSeen::parse(last_seen) {
            Ok(last_seen) => last_seen.since(now()),
            Err(error) => return bad_last_seen(last_seen, error, CHECKHOST_USAGE),
        };

        let started = Instant::now();
        let results =
            query::check_value(self.store.as_ref(), value, since, access.is_admin()).await;
        self.report(value, results, access.is_admin(), started).await
    }

    async fn nick_stats(&self, context: &CommandContext) -> Vec<String> {
        if !self.config.is_bot_admin(&context.source_mask) {
            tracing::info!(source = %context.source_mask, "Refused nickstats");
            return vec![NO_PERMISSION.to_owned()];
        }

        match query::stats(self.store.as_ref()).await {
            Ok(stats) => vec![stats.to_string()],
            Err(error) => {
                tracing::error!(%error, "Couldn't collect store statistics");
                vec!["Search failed.".to_owned()]
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sherlock_core::store::jsonfile::JsonStore;

    pub(crate) fn sherlock_config() -> SherlockConfig {
        json5::from_str(
            r##"{
                "channels": { "normal": ["#help"], "admin": ["#opers"] },
                "regex": {
                    "nick": "\\*\\*\\* Notice -- Nick change: From (?P<oldnick>\\S+) to (?P<newnick>\\S+)",
                    "connect": "\\*\\*\\* Notice -- Client connecting: (?P<nick>\\S+) \\((?P<ident>[^@]+)@(?P<host>[^)]+)\\) \\[(?P<addr>[^\\]]+)\\]"
                },
                "bot-admins": ["*!*@staff/*"]
            }"##,
        )
        .unwrap()
    }

    pub(crate) async fn handler_with_data() -> CommandHandler {
        let store = JsonStore::in_memory();
        let now = now();
        for (kind, nick, value) in [
            (ObservationKind::Host, "Alice", "h1.example"),
            (ObservationKind::Address, "Alice", "192.0.2.1"),
            (ObservationKind::Mask, "Alice", "user/alice"),
            (ObservationKind::Host, "Alice2", "h1.example"),
        ] {
            store.record(kind, nick, value, now).await.unwrap();
        }

        CommandHandler::new(
            Arc::new(sherlock_config()),
            Arc::new(store),
            Arc::new(PasteRegistry::new()),
        )
    }

    fn in_channel(access: Option<ChannelAccess>) -> CommandContext {
        CommandContext {
            access,
            source_mask: "someone!user@host.example".to_owned(),
        }
    }

    fn strip_timing(mut lines: Vec<String>) -> Vec<String> {
        if let Some(last) = lines.last_mut() {
            if let Some(index) = last.find(" in ") {
                last.truncate(index);
            }
        }
        lines
    }

    #[test]
    fn command_parsing() {
        assert_eq!(
            parse_command(".", ".check alice 1d"),
            Some(("check".to_owned(), "alice 1d"))
        );
        assert_eq!(parse_command(".", ".NICKSTATS"), Some(("nickstats".to_owned(), "")));
        assert_eq!(parse_command(".", "check alice"), None);
        assert_eq!(parse_command(".", ". check"), None);
        assert_eq!(parse_command("!", "!check2   h1 "), Some(("check2".to_owned(), "h1")));
    }

    #[test]
    fn query_splitting() {
        assert_eq!(split_query(" alice  2h "), Some(("alice", Some("2h"))));
        assert_eq!(split_query("alice"), Some(("alice", None)));
        assert_eq!(split_query("  "), None);
    }

    #[tokio::test]
    async fn check_in_normal_channel_hides_hosts() {
        let handler = handler_with_data().await;

        let lines = handler
            .handle(&in_channel(Some(ChannelAccess::Normal)), "check", "alice")
            .await;

        assert_eq!(
            strip_timing(lines),
            vec![
                "Results for 'alice':",
                "\x0303nicks\x0f: Alice, Alice2",
                "\x0303masks\x0f: user/alice",
                "Done. Found 2 nicks and 1 mask",
            ]
        );
    }

    #[tokio::test]
    async fn check_in_admin_channel_shows_hosts() {
        let handler = handler_with_data().await;

        let lines = handler
            .handle(&in_channel(Some(ChannelAccess::Admin)), "check", "ALICE *")
            .await;

        assert_eq!(
            strip_timing(lines),
            vec![
                "Results for 'ALICE':",
                "\x0303nicks\x0f: Alice, Alice2",
                "\x0303masks\x0f: user/alice",
                "\x0303hosts\x0f: h1.example",
                "\x0303addrs\x0f: 192.0.2.1",
                "Done. Found 2 nicks, 1 mask, 1 host and 1 address",
            ]
        );
    }

    #[tokio::test]
    async fn commands_ignored_outside_configured_channels() {
        let handler = handler_with_data().await;

        assert!(handler
            .handle(&in_channel(None), "check", "alice")
            .await
            .is_empty());
        assert!(handler
            .handle(&in_channel(None), "checkhost", "h1.example")
            .await
            .is_empty());
        assert!(handler
            .handle(&in_channel(Some(ChannelAccess::Admin)), "frobnicate", "")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn usage_errors() {
        let handler = handler_with_data().await;
        let context = in_channel(Some(ChannelAccess::Normal));

        assert_eq!(handler.handle(&context, "check", "").await, vec![CHECK_USAGE]);

        let lines = handler.handle(&context, "check", "alice 3 fortnights").await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Invalid last_seen '3 fortnights' (unknown time unit 'fortnights')"));
    }

    #[tokio::test]
    async fn checkhost_by_access() {
        let handler = handler_with_data().await;

        let normal = handler
            .handle(&in_channel(Some(ChannelAccess::Normal)), "check2", "H1.EXAMPLE")
            .await;
        assert_eq!(strip_timing(normal), vec!["Results for 'H1.EXAMPLE':", "None."]);

        let admin = handler
            .handle(&in_channel(Some(ChannelAccess::Admin)), "checkhost", "H1.EXAMPLE 1h")
            .await;
        assert_eq!(
            strip_timing(admin),
            vec![
                "Results for 'H1.EXAMPLE':",
                "\x0303nicks\x0f: Alice, Alice2",
                "\x0303hosts\x0f: h1.example",
                "Done. Found 2 nicks, 0 masks, 1 host and 0 addresses",
            ]
        );
    }

    #[tokio::test]
    async fn nickstats_needs_bot_admin() {
        let handler = handler_with_data().await;

        let refused = handler.handle(&in_channel(None), "nickstats", "").await;
        assert_eq!(refused, vec![NO_PERMISSION]);

        let admin = CommandContext {
            access: None,
            source_mask: "oper!o@staff/oper".to_owned(),
        };
        assert_eq!(
            handler.handle(&admin, "nickstats", "").await,
            vec!["2 nicks, 1 host, 1 address and 1 mask"]
        );
    }
}
