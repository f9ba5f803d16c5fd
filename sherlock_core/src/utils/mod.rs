mod or_log;
pub use or_log::OrLog;

/// The current time, as stored in observation records
pub fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
