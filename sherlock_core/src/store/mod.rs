use crate::casemap::NickKey;
use crate::observation::{Observation, ObservationKind};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("{0}")]
    DbError(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl StoreError {
    pub fn from_inner<T: std::error::Error + Send + Sync + 'static>(inner: T) -> Self {
        Self::DbError(Box::new(inner))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A nick as stored alongside an observation: its casefolded key and the form in
/// which it was last seen
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeenNick {
    pub nick: NickKey,
    pub nick_case: String,
}

/// Trait defining an observation storage provider.
///
/// Each [`ObservationKind`] is a separate table keyed by (casefolded nick, value).
/// Filters taking `since` only return rows last seen at or after that time; `None`
/// returns rows of any age.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Record a sighting of `value` for `nick`. Creates the row if this pair hasn't
    /// been seen before, otherwise updates its last-seen time and display nick.
    async fn record(
        &self,
        kind: ObservationKind,
        nick: &str,
        value: &str,
        now: NaiveDateTime,
    ) -> Result<()>;

    /// Every value recorded for `nick`
    async fn values_for_nick(
        &self,
        kind: ObservationKind,
        nick: &NickKey,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<String>>;

    /// Every nick recorded with any of `values`
    async fn nicks_for_values(
        &self,
        kind: ObservationKind,
        values: &[String],
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<SeenNick>>;

    /// Every row whose value equals `value`, ignoring case
    async fn find_value(
        &self,
        kind: ObservationKind,
        value: &str,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Observation>>;

    /// Every (nick, value) pair in the table
    async fn all_pairs(&self, kind: ObservationKind) -> Result<Vec<(NickKey, String)>>;
}

pub mod jsonfile;
