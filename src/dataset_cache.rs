use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::DataError;
use crate::fixtures::{FixtureDataset, load_fixtures};
use crate::gameweek::GameweekConfig;
use crate::players::{PlayerDataset, load_players};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug)]
struct CacheEntry<T> {
    stamp: FileStamp,
    data: Arc<T>,
}

/// Loaded datasets keyed by path, reused until the file's modification time or
/// size changes. Owned by the application context; nothing is global.
#[derive(Debug, Default)]
pub struct DatasetCache {
    fixtures: HashMap<PathBuf, (GameweekConfig, CacheEntry<FixtureDataset>)>,
    players: HashMap<PathBuf, CacheEntry<PlayerDataset>>,
    loads: usize,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixtures(
        &mut self,
        path: &Path,
        cfg: &GameweekConfig,
    ) -> Result<Arc<FixtureDataset>, DataError> {
        let key = cache_key(path);
        let stamp = file_stamp(path)?;
        if let Some((cached_cfg, entry)) = self.fixtures.get(&key)
            && cached_cfg == cfg
            && entry.stamp == stamp
        {
            return Ok(Arc::clone(&entry.data));
        }

        let data = Arc::new(load_fixtures(path, cfg)?);
        self.loads += 1;
        self.fixtures.insert(
            key,
            (
                *cfg,
                CacheEntry {
                    stamp,
                    data: Arc::clone(&data),
                },
            ),
        );
        Ok(data)
    }

    pub fn players(&mut self, path: &Path) -> Result<Arc<PlayerDataset>, DataError> {
        let key = cache_key(path);
        let stamp = file_stamp(path)?;
        if let Some(entry) = self.players.get(&key)
            && entry.stamp == stamp
        {
            return Ok(Arc::clone(&entry.data));
        }

        let data = Arc::new(load_players(path)?);
        self.loads += 1;
        self.players.insert(
            key,
            CacheEntry {
                stamp,
                data: Arc::clone(&data),
            },
        );
        Ok(data)
    }

    pub fn invalidate(&mut self, path: &Path) {
        let key = cache_key(path);
        self.fixtures.remove(&key);
        self.players.remove(&key);
    }

    pub fn clear(&mut self) {
        self.fixtures.clear();
        self.players.clear();
    }

    /// Number of times a file was actually read and parsed.
    pub fn loads(&self) -> usize {
        self.loads
    }
}

fn cache_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn file_stamp(path: &Path) -> Result<FileStamp, DataError> {
    let meta = fs::metadata(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            DataError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            DataError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    Ok(FileStamp {
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}
