use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::{
    collections::{hash_map::Entry, HashMap},
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::NamedTempFile;

use super::*;

type Table = HashMap<(NickKey, String), Observation>;

/// A simple JSON file-backed observation store for small deployments and testing
///
/// The whole store is held in memory and rewritten on every change. This is not
/// intended to perform adequately under significant loads.
pub struct JsonStore {
    filename: Option<PathBuf>,

    state: RwLock<JsonStoreState>,

    /// Generation of the state last written to disk. Held for the whole of a write,
    /// so only one write happens at a time.
    saved: Arc<Mutex<u64>>,
}

#[serde_as]
#[derive(Serialize, Deserialize, Default)]
struct JsonStoreState {
    /// Bumped on every change
    #[serde(skip)]
    generation: u64,

    #[serde_as(as = "Vec<(_,_)>")]
    hosts: Table,

    #[serde_as(as = "Vec<(_,_)>")]
    masks: Table,

    #[serde_as(as = "Vec<(_,_)>")]
    addrs: Table,
}

impl JsonStoreState {
    fn table(&self, kind: ObservationKind) -> &Table {
        match kind {
            ObservationKind::Host => &self.hosts,
            ObservationKind::Mask => &self.masks,
            ObservationKind::Address => &self.addrs,
        }
    }

    fn table_mut(&mut self, kind: ObservationKind) -> &mut Table {
        match kind {
            ObservationKind::Host => &mut self.hosts,
            ObservationKind::Mask => &mut self.masks,
            ObservationKind::Address => &mut self.addrs,
        }
    }
}

/// Replace `filename` with `contents`, via a temporary file in the same directory so
/// that a crash mid-write doesn't lose the previous contents
fn write_file(filename: &Path, contents: &[u8]) -> Result<()> {
    let dir = match filename.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(StoreError::from_inner)?;
    file.write_all(contents).map_err(StoreError::from_inner)?;
    file.persist(filename).map_err(StoreError::from_inner)?;

    Ok(())
}

impl JsonStore {
    /// Open the store saved in `filename`, or start an empty one there if the file
    /// doesn't exist yet
    pub fn open(filename: impl Into<PathBuf>) -> Result<Self> {
        let filename = filename.into();

        let state = if filename.exists() {
            let file = File::open(&filename).map_err(StoreError::from_inner)?;
            serde_json::from_reader(BufReader::new(file)).map_err(StoreError::from_inner)?
        } else {
            tracing::warn!(?filename, "Couldn't find store file, starting from empty");
            JsonStoreState::default()
        };

        Ok(Self {
            filename: Some(filename),
            state: RwLock::new(state),
            saved: Arc::new(Mutex::new(0)),
        })
    }

    /// A store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            filename: None,
            state: RwLock::new(JsonStoreState::default()),
            saved: Arc::new(Mutex::new(0)),
        }
    }

    /// Write a snapshot of generation `generation` to disk, on the blocking pool.
    /// Snapshots older than one already written are dropped.
    async fn save(&self, generation: u64, contents: Vec<u8>) -> Result<()> {
        let Some(filename) = self.filename.clone() else {
            return Ok(());
        };
        let saved = Arc::clone(&self.saved);

        tokio::task::spawn_blocking(move || {
            let mut saved = saved.lock();
            if *saved >= generation {
                return Ok(());
            }

            write_file(&filename, &contents)?;
            *saved = generation;
            Ok(())
        })
        .await
        .map_err(StoreError::from_inner)?
    }
}

#[async_trait]
impl ObservationStore for JsonStore {
    async fn record(
        &self,
        kind: ObservationKind,
        nick: &str,
        value: &str,
        now: NaiveDateTime,
    ) -> Result<()> {
        let (generation, contents) = {
            let mut state = self.state.write();
            match state
                .table_mut(kind)
                .entry((NickKey::new(nick), value.to_owned()))
            {
                Entry::Occupied(mut entry) => entry.get_mut().refresh(nick, now),
                Entry::Vacant(entry) => {
                    entry.insert(Observation::new(nick, value, now));
                }
            }
            state.generation += 1;

            if self.filename.is_none() {
                return Ok(());
            }
            let contents = serde_json::to_vec(&*state).map_err(StoreError::from_inner)?;
            (state.generation, contents)
        };

        self.save(generation, contents).await
    }

    async fn values_for_nick(
        &self,
        kind: ObservationKind,
        nick: &NickKey,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<String>> {
        Ok(self
            .state
            .read()
            .table(kind)
            .values()
            .filter(|o| &o.nick == nick && o.seen_since(since))
            .map(|o| o.value.clone())
            .collect())
    }

    async fn nicks_for_values(
        &self,
        kind: ObservationKind,
        values: &[String],
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<SeenNick>> {
        Ok(self
            .state
            .read()
            .table(kind)
            .values()
            .filter(|o| values.contains(&o.value) && o.seen_since(since))
            .map(|o| SeenNick {
                nick: o.nick.clone(),
                nick_case: o.nick_case.clone(),
            })
            .collect())
    }

    async fn find_value(
        &self,
        kind: ObservationKind,
        value: &str,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Observation>> {
        let value = value.to_lowercase();

        Ok(self
            .state
            .read()
            .table(kind)
            .values()
            .filter(|o| o.value.to_lowercase() == value && o.seen_since(since))
            .cloned()
            .collect())
    }

    async fn all_pairs(&self, kind: ObservationKind) -> Result<Vec<(NickKey, String)>> {
        Ok(self.state.read().table(kind).keys().cloned().collect())
    }
}
