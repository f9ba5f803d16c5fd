//! Nick tracking for IRC operators.
//!
//! Watches server notices for connecting users and nick changes, asks the server
//! for the hosts, addresses and masks involved, and records every observation so
//! that shared identities can be looked up later.

pub mod prelude;

pub mod casemap;
pub mod config;
pub mod correlator;
pub mod format;
pub mod numerics;
pub mod observation;
pub mod paste;
pub mod pattern;
pub mod query;
pub mod snotice;
pub mod store;
pub mod timeparse;
pub mod tracker;

pub mod utils;
