use crate::{
    commands::CommandHandler,
    config::{BotConfig, DatabaseConfig, LoggingConfig},
    pastebin::build_registry,
    session::Session,
    sink::IrcSink,
};

use anyhow::Context;
use daemonize::Daemonize;
use futures::StreamExt;
use irc::client::Client;
use sherlock_core::{prelude::*, store::jsonfile::JsonStore};
use sherlock_pg::PgObservationStore;
use std::{fs::File, path::Path, sync::Arc, time::Duration};
use tracing_subscriber::util::SubscriberInitExt;

/// How long to wait before reconnecting after losing the server
const RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// `sherlock-<version>[-<commit>][-dirty]`
pub fn version() -> String {
    let git_version = crate::build_data::GIT_COMMIT_HASH
        .map(|s| format!("-{}", s))
        .unwrap_or_default();
    let git_dirty = if matches!(crate::build_data::GIT_DIRTY, Some(true)) {
        "-dirty"
    } else {
        ""
    };
    format!(
        "sherlock-{}{}{}",
        crate::build_data::PKG_VERSION,
        git_version,
        git_dirty
    )
}

async fn open_store(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn ObservationStore>> {
    Ok(match config {
        DatabaseConfig::Jsonfile { path } => Arc::new(
            JsonStore::open(path)
                .with_context(|| format!("Couldn't open observation file {}", path.display()))?,
        ),
        DatabaseConfig::Postgres {
            url,
            auto_run_migrations,
        } => {
            if *auto_run_migrations {
                sherlock_pg::run_migrations(url.clone())
                    .await
                    .context("Couldn't run database migrations")?;
            }
            Arc::new(
                PgObservationStore::connect(url)
                    .await
                    .context("Couldn't connect to database")?,
            )
        }
    })
}

enum Disconnect {
    Shutdown,
    Lost,
}

/// Run one connection until it drops or we're asked to stop
async fn run_connection(
    config: &BotConfig,
    store: &Arc<dyn ObservationStore>,
    commands: &Arc<CommandHandler>,
    sherlock: &Arc<SherlockConfig>,
) -> anyhow::Result<Disconnect> {
    let mut client_config = config.irc.client_config(sherlock.channels.all());
    client_config.version = Some(version());

    let mut client = Client::from_config(client_config).await?;
    client.identify()?;
    let mut stream = client.stream()?;

    let sink = IrcSink::new(Arc::new(client.sender()));
    let tracker = Arc::new(
        Tracker::new(
            Arc::new(Correlator::new(sherlock.lookup_timeout())),
            store.clone(),
            Arc::new(sink.clone()),
        )
        .with_recheck_delay(sherlock.recheck_delay()),
    );
    let mut session = Session::new(
        tracker,
        NoticePatterns::compile(&sherlock.regex)?,
        sherlock.clone(),
        commands.clone(),
        sink,
        config.irc.oper.clone(),
    );

    let result = loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(message)) => {
                    tracing::trace!(%message, "Received");
                    session.handle_message(&message);
                }
                Some(Err(error)) => {
                    tracing::error!(%error, "Connection error");
                    break Disconnect::Lost;
                }
                None => {
                    tracing::warn!("Connection closed by server");
                    break Disconnect::Lost;
                }
            },
            // Reap finished work; disabled while there is none
            Some(()) = session.join_next() => (),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                client.send_quit("Shutting down").or_log("sending QUIT");
                break Disconnect::Shutdown;
            }
        }
    };

    session.disconnected();
    Ok(result)
}

async fn sherlock_main(config: BotConfig) -> anyhow::Result<()> {
    crate::tracing_config::build_subscriber(&config.log).init();
    tracing::info!(version = %version(), "Starting");

    let store = open_store(&config.database).await?;
    let pastebins = Arc::new(build_registry(&config.paste)?);
    let sherlock = Arc::new(config.sherlock.clone());
    let commands = Arc::new(CommandHandler::new(sherlock.clone(), store.clone(), pastebins));

    loop {
        match run_connection(&config, &store, &commands, &sherlock).await {
            Ok(Disconnect::Shutdown) => return Ok(()),
            Ok(Disconnect::Lost) => (),
            Err(error) => tracing::error!(%error, "Couldn't connect"),
        }

        tracing::info!(delay = ?RECONNECT_DELAY, "Reconnecting");
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => (),
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

/// Daemonising set up as the logging config asks. Output files are created here, so
/// that problems with them are reported before forking.
fn daemon(log: &LoggingConfig) -> anyhow::Result<Daemonize<()>> {
    let mut daemon = Daemonize::new().working_directory(std::env::current_dir()?);

    if let Some(stdout) = &log.stdout {
        daemon = daemon.stdout(File::create(log.prefix_file(stdout))?);
    }
    if let Some(stderr) = &log.stderr {
        daemon = daemon.stderr(File::create(log.prefix_file(stderr))?);
    }
    if let Some(pidfile) = &log.pidfile {
        daemon = daemon.pid_file(log.prefix_file(pidfile));
    }

    Ok(daemon)
}

/// Run the bot.
///
/// The config is loaded and checked before daemonising, so that as many errors as
/// possible are reported to the terminal. Because the tokio runtime can't survive
/// forking, it is only created after that.
pub fn run_bot(config_path: impl AsRef<Path>, foreground: bool) -> anyhow::Result<()> {
    let config_path = config_path.as_ref();
    let config = BotConfig::load_file(config_path)
        .with_context(|| format!("Couldn't load {}", config_path.display()))?;

    if !config.log.dir.is_dir() {
        std::fs::create_dir_all(&config.log.dir).context("Couldn't create log directory")?;
    }

    if !foreground {
        let daemon = daemon(&config.log)?;
        println!("Running in background mode");
        daemon.start().context("Failed to fork to background")?;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(sherlock_main(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_names_the_bot() {
        assert!(version().starts_with(&format!("sherlock-{}", env!("CARGO_PKG_VERSION"))));
    }

    #[test]
    fn daemon_output_files_created_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::parse(crate::config::tests::EXAMPLE).unwrap();
        let log = LoggingConfig {
            dir: dir.path().to_owned(),
            stdout: Some("stdout.log".into()),
            stderr: Some("stderr.log".into()),
            pidfile: Some("sherlock.pid".into()),
            ..config.log
        };

        assert!(daemon(&log).is_ok());
        assert!(dir.path().join("stdout.log").exists());
        assert!(dir.path().join("stderr.log").exists());
        // Written by the daemonised child
        assert!(!dir.path().join("sherlock.pid").exists());
    }

    #[tokio::test]
    async fn opens_json_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sherlock.json");

        let store = open_store(&DatabaseConfig::Jsonfile { path: path.clone() })
            .await
            .unwrap();
        store
            .record(ObservationKind::Host, "Alice", "h1.example", sherlock_core::utils::now())
            .await
            .unwrap();

        assert!(path.exists());
    }
}
