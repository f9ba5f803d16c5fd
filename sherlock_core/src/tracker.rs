//! Recording of observations in response to server notices.

use crate::correlator::{CommandSink, Correlator, LookupError, LookupKind};
use crate::numerics;
use crate::observation::ObservationKind;
use crate::snotice::ServerNotice;
use crate::store::{ObservationStore, StoreError};
use crate::utils::now;

use chrono::NaiveDateTime;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{0}")]
    Lookup(#[from] LookupError),
    #[error("{0}")]
    Store(#[from] StoreError),
}

type ObservationTask<'a> = BoxFuture<'a, Result<(), TrackerError>>;

/// Looks up and records user details for a single server connection
pub struct Tracker {
    correlator: Arc<Correlator>,
    store: Arc<dyn ObservationStore>,
    sink: Arc<dyn CommandSink>,
    recheck_delay: Option<Duration>,
}

impl Tracker {
    pub fn new(
        correlator: Arc<Correlator>,
        store: Arc<dyn ObservationStore>,
        sink: Arc<dyn CommandSink>,
    ) -> Self {
        Self {
            correlator,
            store,
            sink,
            recheck_delay: None,
        }
    }

    /// Look the mask up a second time, `delay` after a connect or nick change, to catch
    /// cloaks applied shortly after connection
    pub fn with_recheck_delay(mut self, delay: Option<Duration>) -> Self {
        self.recheck_delay = delay;
        self
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    pub fn store(&self) -> &Arc<dyn ObservationStore> {
        &self.store
    }

    /// Ask the server for a user's details and wait for the answer
    pub async fn lookup(&self, kind: LookupKind, nick: &str) -> Result<String, LookupError> {
        self.correlator.lookup(kind, nick, self.sink.as_ref()).await
    }

    /// Resolve any lookups answered by a numeric reply
    pub fn handle_reply(&self, numeric: &str, params: &[String]) -> usize {
        numerics::route_reply(&self.correlator, numeric, params)
    }

    /// Record everything a server notice tells us, looking up whatever it doesn't
    #[tracing::instrument(skip(self))]
    pub async fn handle_notice(&self, notice: ServerNotice) -> Result<(), TrackerError> {
        match notice {
            ServerNotice::Connect {
                nick, host, addr, ..
            } => self.on_connect(&nick, &host, &addr).await,
            ServerNotice::NickChange { old_nick, new_nick } => {
                self.on_nick_change(&old_nick, &new_nick).await
            }
        }
    }

    /// A client connected: its host and address are known, its mask has to be looked up
    pub async fn on_connect(&self, nick: &str, host: &str, addr: &str) -> Result<(), TrackerError> {
        let now = now();
        let nicks = [nick];

        let mut tasks: Vec<ObservationTask> = vec![
            self.record(ObservationKind::Host, nick, host, now).boxed(),
            self.record(ObservationKind::Address, nick, addr, now).boxed(),
            self.lookup_and_record(LookupKind::UserMask, &nicks, nick, now)
                .boxed(),
        ];
        tasks.extend(self.recheck_mask(&nicks, nick));

        join_observations(tasks).await
    }

    /// A client changed nick: look up its details under the new nick and record them
    /// for both, so that a search for either finds the other
    pub async fn on_nick_change(&self, old_nick: &str, new_nick: &str) -> Result<(), TrackerError> {
        let now = now();
        let nicks = [old_nick, new_nick];

        let mut tasks: Vec<ObservationTask> = vec![
            self.lookup_and_record(LookupKind::UserHost, &nicks, new_nick, now)
                .boxed(),
            self.lookup_and_record(LookupKind::UserIp, &nicks, new_nick, now)
                .boxed(),
            self.lookup_and_record(LookupKind::UserMask, &nicks, new_nick, now)
                .boxed(),
        ];
        tasks.extend(self.recheck_mask(&nicks, new_nick));

        join_observations(tasks).await
    }

    async fn record(
        &self,
        kind: ObservationKind,
        nick: &str,
        value: &str,
        now: NaiveDateTime,
    ) -> Result<(), TrackerError> {
        tracing::debug!(%kind, nick, value, "Recording observation");
        self.store.record(kind, nick, value, now).await?;
        Ok(())
    }

    /// Look up `lookup_nick`, then record the result under each of `record_nicks`
    async fn lookup_and_record(
        &self,
        kind: LookupKind,
        record_nicks: &[&str],
        lookup_nick: &str,
        now: NaiveDateTime,
    ) -> Result<(), TrackerError> {
        let value = self.lookup(kind, lookup_nick).await?;
        let observation = kind.observation();

        let results = join_all(
            record_nicks
                .iter()
                .map(|nick| self.record(observation, nick, &value, now)),
        )
        .await;

        results.into_iter().collect()
    }

    fn recheck_mask<'a>(
        &'a self,
        record_nicks: &'a [&'a str],
        lookup_nick: &'a str,
    ) -> Option<ObservationTask<'a>> {
        let delay = self.recheck_delay?;

        Some(
            async move {
                tokio::time::sleep(delay).await;
                self.lookup_and_record(LookupKind::UserMask, record_nicks, lookup_nick, now())
                    .await
            }
            .boxed(),
        )
    }
}

/// Run independent observation tasks to completion. Every failure is logged; the
/// first one is returned.
async fn join_observations(tasks: Vec<ObservationTask<'_>>) -> Result<(), TrackerError> {
    let mut first_error = None;

    for result in join_all(tasks).await {
        if let Err(error) = result {
            tracing::warn!(%error, "Failed to record observation");
            first_error.get_or_insert(error);
        }
    }

    first_error.map_or(Ok(()), Err)
}
