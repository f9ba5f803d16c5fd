//! Collects commonly-used names for convenient import

pub use crate::{
    casemap::{rfc_casefold, rfc_eq, NickKey},
    config::{ChannelAccess, SherlockConfig},
    correlator::{CommandSink, Correlator, LookupError, LookupKind},
    observation::{Observation, ObservationKind},
    paste::{PasteError, PasteOptions, PasteRegistry, Pastebin},
    query::{LookupResults, StoreStats},
    snotice::{NoticePatterns, ServerNotice},
    store::{ObservationStore, SeenNick, StoreError},
    timeparse::LastSeen,
    tracker::{Tracker, TrackerError},
    utils::OrLog,
};
