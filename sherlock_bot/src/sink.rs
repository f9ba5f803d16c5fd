//! Outbound side of the IRC connection

use irc::client::Sender;
use irc::proto::Command;
use sherlock_core::prelude::*;
use std::sync::Arc;

/// Somewhere to send IRC commands
pub trait MessageSink: Send + Sync {
    fn send_message(&self, command: Command);
}

impl MessageSink for Sender {
    fn send_message(&self, command: Command) {
        self.send(command).or_log("sending IRC message");
    }
}

/// Lookups and replies for a single connection
#[derive(Clone)]
pub struct IrcSink {
    inner: Arc<dyn MessageSink>,
}

impl IrcSink {
    pub fn new(inner: Arc<dyn MessageSink>) -> Self {
        Self { inner }
    }

    pub fn send(&self, command: Command) {
        self.inner.send_message(command);
    }

    pub fn privmsg(&self, target: &str, text: &str) {
        self.send(Command::PRIVMSG(target.to_owned(), text.to_owned()));
    }
}

impl CommandSink for IrcSink {
    fn send_command(&self, command: &str, arg: &str) {
        self.send(Command::Raw(command.to_owned(), vec![arg.to_owned()]));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Keeps everything sent, for inspection
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) sent: Mutex<Vec<Command>>,
    }

    impl RecordingSink {
        pub(crate) fn take(&self) -> Vec<Command> {
            std::mem::take(&mut *self.sent.lock())
        }
    }

    impl MessageSink for RecordingSink {
        fn send_message(&self, command: Command) {
            self.sent.lock().push(command);
        }
    }

    #[test]
    fn lookups_are_sent_raw() {
        let recorder = Arc::new(RecordingSink::default());
        let sink = IrcSink::new(recorder.clone());

        sink.send_command("USERIP", "Alice");
        sink.privmsg("#help", "hello");

        assert_eq!(
            recorder.take(),
            vec![
                Command::Raw("USERIP".to_owned(), vec!["Alice".to_owned()]),
                Command::PRIVMSG("#help".to_owned(), "hello".to_owned()),
            ]
        );
    }
}
