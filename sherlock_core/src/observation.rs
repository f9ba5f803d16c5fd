//! Observation records: one row per (nick, value) pair and kind.

use crate::casemap::NickKey;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// The attribute of a user that an observation records
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObservationKind {
    /// The real hostname, as seen in connection notices and USERHOST replies
    Host,
    /// The visible (possibly cloaked) host, as seen in WHO replies
    Mask,
    /// The IP address
    Address,
}

/// A single observation of `value` for the user `nick`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub nick: NickKey,
    pub value: String,
    pub created: NaiveDateTime,
    pub seen: NaiveDateTime,
    /// The nickname as it was last seen, before casefolding
    pub nick_case: String,
}

impl Observation {
    pub fn new(nick_case: &str, value: &str, now: NaiveDateTime) -> Self {
        Self {
            nick: NickKey::new(nick_case),
            value: value.to_owned(),
            created: now,
            seen: now,
            nick_case: nick_case.to_owned(),
        }
    }

    /// Update this record for a repeated sighting
    pub fn refresh(&mut self, nick_case: &str, now: NaiveDateTime) {
        self.seen = now;
        self.nick_case = nick_case.to_owned();
    }

    /// Whether this record was seen at or after `since`. `None` matches everything.
    pub fn seen_since(&self, since: Option<NaiveDateTime>) -> bool {
        since.map_or(true, |since| self.seen >= since)
    }
}
