//! Searches over recorded observations, as used by the `check`, `checkhost` and
//! `nickstats` commands.

use crate::casemap::NickKey;
use crate::format::{pluralize, text_list};
use crate::observation::ObservationKind;
use crate::store::{ObservationStore, Result};

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Display;
use strum::IntoEnumIterator;

/// Everything found by a search, grouped by what it is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupResults {
    pub nicks: BTreeSet<String>,
    pub masks: BTreeSet<String>,
    pub hosts: BTreeSet<String>,
    pub addrs: BTreeSet<String>,
}

impl LookupResults {
    fn values_mut(&mut self, kind: ObservationKind) -> &mut BTreeSet<String> {
        match kind {
            ObservationKind::Host => &mut self.hosts,
            ObservationKind::Mask => &mut self.masks,
            ObservationKind::Address => &mut self.addrs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nicks.is_empty()
            && self.masks.is_empty()
            && self.hosts.is_empty()
            && self.addrs.is_empty()
    }
}

/// Find every host, address and mask recorded for `nick`, and every nick that
/// shares any of them.
///
/// Hosts and addresses are always collected, since they drive the expansion;
/// whether they are shown is up to the caller.
pub async fn check_nick(
    store: &dyn ObservationStore,
    nick: &str,
    since: Option<NaiveDateTime>,
) -> Result<LookupResults> {
    let key = NickKey::new(nick);
    let mut results = LookupResults::default();
    // One display form per user: the last one seen wins
    let mut nicks = BTreeMap::new();

    for kind in ObservationKind::iter() {
        let values = store.values_for_nick(kind, &key, since).await?;
        if values.is_empty() {
            continue;
        }

        for seen in store.nicks_for_values(kind, &values, since).await? {
            nicks.insert(seen.nick, seen.nick_case);
        }

        results.values_mut(kind).extend(values);
    }

    results.nicks = nicks.into_values().collect();
    Ok(results)
}

/// Find every nick recorded with `value` as a mask, ignoring case. With `admin`,
/// hosts and addresses are searched too.
pub async fn check_value(
    store: &dyn ObservationStore,
    value: &str,
    since: Option<NaiveDateTime>,
    admin: bool,
) -> Result<LookupResults> {
    let mut results = LookupResults::default();

    for kind in ObservationKind::iter() {
        if kind != ObservationKind::Mask && !admin {
            continue;
        }

        for row in store.find_value(kind, value, since).await? {
            results.nicks.insert(row.nick_case);
            results.values_mut(kind).insert(row.value);
        }
    }

    Ok(results)
}

/// Counts of distinct values across the whole store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub nicks: usize,
    pub hosts: usize,
    pub addrs: usize,
    pub masks: usize,
}

pub async fn stats(store: &dyn ObservationStore) -> Result<StoreStats> {
    let mut nicks = HashSet::new();
    let mut stats = StoreStats::default();

    for kind in ObservationKind::iter() {
        let mut values = HashSet::new();
        for (nick, value) in store.all_pairs(kind).await? {
            nicks.insert(nick);
            values.insert(value);
        }

        match kind {
            ObservationKind::Host => stats.hosts = values.len(),
            ObservationKind::Mask => stats.masks = values.len(),
            ObservationKind::Address => stats.addrs = values.len(),
        }
    }

    stats.nicks = nicks.len();
    Ok(stats)
}

impl Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let parts = [
            pluralize(self.nicks, "nick"),
            pluralize(self.hosts, "host"),
            pluralize(self.addrs, "address"),
            pluralize(self.masks, "mask"),
        ];
        f.write_str(&text_list(&parts, "and"))
    }
}
