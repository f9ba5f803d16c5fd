//! IRC bot that records where users connect from and answers searches over the
//! recorded history.

pub mod config;
pub mod tracing_config;

pub mod commands;
pub mod pastebin;
pub mod session;
pub mod sink;

pub mod run;

mod build_data {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
