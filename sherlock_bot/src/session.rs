//! Dispatch of incoming IRC messages for a single connection

use crate::commands::{parse_command, CommandContext, CommandHandler};
use crate::config::OperConfig;
use crate::sink::IrcSink;

use irc::proto::{ChannelExt, Command, Message, Prefix};
use sherlock_core::{
    format::{chunk_str, MAX_LINE_LENGTH},
    prelude::*,
};
use std::sync::Arc;
use tokio::task::JoinSet;

const RPL_WELCOME: &str = "001";
const RPL_YOUREOPER: &str = "381";

/// The three-digit code of a numeric reply, and its parameters
fn numeric(command: &Command) -> Option<(String, &[String])> {
    match command {
        Command::Response(response, params) => Some((format!("{:03}", *response as u16), params)),
        Command::Raw(code, params)
            if code.len() == 3 && code.bytes().all(|b| b.is_ascii_digit()) =>
        {
            Some((code.clone(), params))
        }
        _ => None,
    }
}

fn prefix_name(prefix: &Prefix) -> &str {
    match prefix {
        Prefix::ServerName(name) => name,
        Prefix::Nickname(nick, _, _) => nick,
    }
}

fn source_mask(prefix: &Prefix) -> String {
    match prefix {
        Prefix::ServerName(name) => name.clone(),
        Prefix::Nickname(nick, user, host) => format!("{nick}!{user}@{host}"),
    }
}

pub struct Session {
    tracker: Arc<Tracker>,
    patterns: NoticePatterns,
    config: Arc<SherlockConfig>,
    commands: Arc<CommandHandler>,
    sink: IrcSink,
    oper: Option<OperConfig>,
    /// Our own nick, as the server told us in the welcome
    nickname: Option<String>,
    /// Name of the server we're connected to. Server notices are only accepted from it.
    server_name: Option<String>,
    /// Notice and command work for this connection
    tasks: JoinSet<()>,
}

impl Session {
    pub fn new(
        tracker: Arc<Tracker>,
        patterns: NoticePatterns,
        config: Arc<SherlockConfig>,
        commands: Arc<CommandHandler>,
        sink: IrcSink,
        oper: Option<OperConfig>,
    ) -> Self {
        Self {
            tracker,
            patterns,
            config,
            commands,
            sink,
            oper,
            nickname: None,
            server_name: None,
            tasks: JoinSet::new(),
        }
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Number of spawned tasks not yet reaped by [`Self::join_next`]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next spawned task to finish. Returns `None` at once if there are
    /// no tasks.
    pub async fn join_next(&mut self) -> Option<()> {
        if let Err(error) = self.tasks.join_next().await? {
            if error.is_panic() {
                tracing::error!(%error, "Session task panicked");
            }
        }
        Some(())
    }

    /// Handle one message from the server. Work that has to wait for the server or the
    /// store is spawned onto the session's task set.
    pub fn handle_message(&mut self, message: &Message) {
        if let Some((code, params)) = numeric(&message.command) {
            self.handle_numeric(message, &code, params);
            return;
        }

        match &message.command {
            Command::NOTICE(..) => self.handle_notice(message),
            Command::PRIVMSG(target, text) => self.handle_privmsg(message, target, text),
            _ => (),
        }
    }

    fn handle_numeric(&mut self, message: &Message, code: &str, params: &[String]) {
        match code {
            RPL_WELCOME => {
                self.server_name = message.prefix.as_ref().map(|p| prefix_name(p).to_owned());
                self.nickname = params.first().cloned();
                tracing::info!(server = ?self.server_name, nick = ?self.nickname, "Registered");

                if let Some(oper) = &self.oper {
                    self.sink
                        .send(Command::OPER(oper.name.clone(), oper.password.clone()));
                }
            }
            RPL_YOUREOPER => {
                tracing::info!("Opered up");
                let snomask = self.oper.as_ref().and_then(|o| o.snomask.as_ref());
                if let (Some(nick), Some(snomask)) = (&self.nickname, snomask) {
                    self.sink.send(Command::Raw(
                        "MODE".to_owned(),
                        vec![nick.clone(), "+s".to_owned(), snomask.clone()],
                    ));
                }
            }
            _ => {
                let resolved = self.tracker.handle_reply(code, params);
                if resolved > 0 {
                    tracing::trace!(code, resolved, "Resolved lookups");
                }
            }
        }
    }

    /// The tracked event a message announces, if it is a server notice we recognise
    pub fn server_notice(&self, message: &Message) -> Option<ServerNotice> {
        let Command::NOTICE(target, text) = &message.command else {
            return None;
        };
        if target.is_channel_name() {
            return None;
        }

        let server_name = self.server_name.as_deref()?;
        let sender = prefix_name(message.prefix.as_ref()?);
        if !rfc_eq(sender, server_name) {
            return None;
        }

        self.patterns.match_notice(text)
    }

    fn handle_notice(&mut self, message: &Message) {
        let Some(notice) = self.server_notice(message) else {
            return;
        };
        tracing::debug!(?notice, "Server notice");

        let tracker = self.tracker.clone();
        self.tasks.spawn(async move {
            tracker
                .handle_notice(notice)
                .await
                .or_log("recording server notice");
        });
    }

    fn handle_privmsg(&mut self, message: &Message, target: &str, text: &str) {
        let Some((name, args)) = parse_command(self.commands.prefix(), text) else {
            return;
        };
        let Some(prefix) = message.prefix.as_ref() else {
            return;
        };

        let (access, reply_to) = if target.is_channel_name() {
            (self.config.channels.access(target), target.to_owned())
        } else {
            (None, prefix_name(prefix).to_owned())
        };
        let context = CommandContext {
            access,
            source_mask: source_mask(prefix),
        };
        let args = args.to_owned();

        let commands = self.commands.clone();
        let sink = self.sink.clone();
        self.tasks.spawn(async move {
            for line in commands.handle(&context, &name, &args).await {
                for chunk in chunk_str(&line, MAX_LINE_LENGTH) {
                    sink.privmsg(&reply_to, &chunk);
                }
            }
        });
    }

    /// The connection has gone; nothing pending can be answered any more, and
    /// rechecks would go out over a dead connection
    pub fn disconnected(&mut self) {
        self.tasks.abort_all();
        self.tracker.correlator().abandon_all();
        self.server_name = None;
        self.nickname = None;
    }
}
