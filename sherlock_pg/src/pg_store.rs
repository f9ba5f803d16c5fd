use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use tokio::sync::Mutex;

use sherlock_core::prelude::*;
use sherlock_core::store::{Result, SeenNick};

diesel::define_sql_function! {
    fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

/// Queries for one observation table. Every table has the same shape apart from the
/// name of its value column.
macro_rules! observation_table {
    ($module:ident, $table:ident, $value:ident) => {
        mod $module {
            use super::lower;
            use crate::models::ObservationRow;
            use crate::schema::$table::dsl::*;

            use chrono::NaiveDateTime;
            use diesel::prelude::*;
            use diesel::upsert::excluded;
            use diesel_async::{AsyncPgConnection, RunQueryDsl};

            pub(super) async fn record(
                conn: &mut AsyncPgConnection,
                key: &str,
                display: &str,
                observed: &str,
                now: NaiveDateTime,
            ) -> QueryResult<()> {
                diesel::insert_into($table)
                    .values((
                        nick.eq(key),
                        $value.eq(observed),
                        created.eq(now),
                        seen.eq(now),
                        nick_case.eq(display),
                    ))
                    .on_conflict((nick, $value))
                    .do_update()
                    .set((seen.eq(excluded(seen)), nick_case.eq(excluded(nick_case))))
                    .execute(conn)
                    .await?;
                Ok(())
            }

            pub(super) async fn values_for_nick(
                conn: &mut AsyncPgConnection,
                key: &str,
                since: Option<NaiveDateTime>,
            ) -> QueryResult<Vec<String>> {
                let mut query = $table.select($value).filter(nick.eq(key)).into_boxed();
                if let Some(since) = since {
                    query = query.filter(seen.ge(since));
                }
                query.load(conn).await
            }

            pub(super) async fn nicks_for_values(
                conn: &mut AsyncPgConnection,
                values: &[String],
                since: Option<NaiveDateTime>,
            ) -> QueryResult<Vec<(String, String)>> {
                let mut query = $table
                    .select((nick, nick_case))
                    .filter($value.eq_any(values))
                    .into_boxed();
                if let Some(since) = since {
                    query = query.filter(seen.ge(since));
                }
                query.load(conn).await
            }

            pub(super) async fn find_value(
                conn: &mut AsyncPgConnection,
                observed: &str,
                since: Option<NaiveDateTime>,
            ) -> QueryResult<Vec<ObservationRow>> {
                let mut query = $table
                    .select((nick, $value, created, seen, nick_case))
                    .filter(lower($value).eq(observed.to_lowercase()))
                    .into_boxed();
                if let Some(since) = since {
                    query = query.filter(seen.ge(since));
                }
                query.load(conn).await
            }

            pub(super) async fn all_pairs(
                conn: &mut AsyncPgConnection,
            ) -> QueryResult<Vec<(String, String)>> {
                $table.select((nick, $value)).load(conn).await
            }
        }
    };
}

observation_table!(host_queries, hosts, host);
observation_table!(mask_queries, masks, mask);
observation_table!(addr_queries, addrs, addr);

/// Run the same query against whichever table holds `kind`
macro_rules! dispatch {
    ($kind:expr, $func:ident ( $($arg:expr),* )) => {
        match $kind {
            ObservationKind::Host => host_queries::$func($($arg),*).await,
            ObservationKind::Mask => mask_queries::$func($($arg),*).await,
            ObservationKind::Address => addr_queries::$func($($arg),*).await,
        }
        .map_err(StoreError::from_inner)
    };
}

/// Implementation of [`ObservationStore`] backed by PostgreSQL
pub struct PgObservationStore {
    database_connection: Mutex<AsyncPgConnection>, // TODO: use a connection pool
}

impl PgObservationStore {
    pub fn new(database_connection: AsyncPgConnection) -> Self {
        Self {
            database_connection: Mutex::new(database_connection),
        }
    }

    pub async fn connect(database: &str) -> Result<Self> {
        let connection = AsyncPgConnection::establish(database)
            .await
            .map_err(StoreError::from_inner)?;
        Ok(Self::new(connection))
    }
}

#[async_trait]
impl ObservationStore for PgObservationStore {
    async fn record(
        &self,
        kind: ObservationKind,
        nick: &str,
        value: &str,
        now: NaiveDateTime,
    ) -> Result<()> {
        let key = NickKey::new(nick);
        let mut conn = self.database_connection.lock().await;
        dispatch!(kind, record(&mut conn, key.as_str(), nick, value, now))
    }

    async fn values_for_nick(
        &self,
        kind: ObservationKind,
        nick: &NickKey,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<String>> {
        let mut conn = self.database_connection.lock().await;
        dispatch!(kind, values_for_nick(&mut conn, nick.as_str(), since))
    }

    async fn nicks_for_values(
        &self,
        kind: ObservationKind,
        values: &[String],
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<SeenNick>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.database_connection.lock().await;
        let rows = dispatch!(kind, nicks_for_values(&mut conn, values, since))?;

        Ok(rows
            .into_iter()
            .map(|(nick, nick_case)| SeenNick {
                nick: NickKey::new(&nick),
                nick_case,
            })
            .collect())
    }

    async fn find_value(
        &self,
        kind: ObservationKind,
        value: &str,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Observation>> {
        let mut conn = self.database_connection.lock().await;
        let rows = dispatch!(kind, find_value(&mut conn, value, since))?;
        Ok(rows.into_iter().map(Observation::from).collect())
    }

    async fn all_pairs(&self, kind: ObservationKind) -> Result<Vec<(NickKey, String)>> {
        let mut conn = self.database_connection.lock().await;
        let rows = dispatch!(kind, all_pairs(&mut conn))?;
        Ok(rows
            .into_iter()
            .map(|(nick, value)| (NickKey::new(&nick), value))
            .collect())
    }
}
