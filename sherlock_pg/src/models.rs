use diesel::prelude::*;
use sherlock_core::prelude::*;

/// A row of any of the observation tables, selected as
/// `(nick, <value>, created, seen, nick_case)`
#[derive(Queryable, Debug)]
pub struct ObservationRow {
    pub nick: String,
    pub value: String,
    pub created: chrono::NaiveDateTime,
    pub seen: chrono::NaiveDateTime,
    pub nick_case: String,
}

impl From<ObservationRow> for Observation {
    fn from(row: ObservationRow) -> Self {
        Self {
            nick: NickKey::new(&row.nick),
            value: row.value,
            created: row.created,
            seen: row.seen,
            nick_case: row.nick_case,
        }
    }
}
