//! Best-performer persistence keyed by encounter number.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use adaptive_arena_core::{Archetype, ParameterSet};
use serde::{Deserialize, Serialize};

/// Winning parameters recorded for one encounter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestPerformer {
    /// Archetype the parameters were adapted for.
    pub archetype: Archetype,
    /// Fitness of the installed winner.
    pub fitness: f64,
    /// Installed parameters.
    pub parameters: ParameterSet,
}

/// JSON file mapping encounter numbers to their best performer.
///
/// Storage is best effort: read and write failures are logged and otherwise
/// ignored.
#[derive(Clone, Debug)]
pub struct BestPerformerStore {
    path: PathBuf,
}

impl BestPerformerStore {
    /// Creates a store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every recorded entry; missing or unreadable files yield an empty map.
    #[must_use]
    pub fn load(&self) -> BTreeMap<u32, BestPerformer> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::debug!(path = %self.path.display(), %err, "no best performers loaded");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %self.path.display(), %err, "discarding corrupt best performers");
            BTreeMap::new()
        })
    }

    /// Stores `entry` under `encounter`, replacing any previous entry.
    pub fn record(&self, encounter: u32, entry: BestPerformer) {
        let mut entries = self.load();
        let _ = entries.insert(encounter, entry);
        let written = serde_json::to_string_pretty(&entries)
            .map_err(|err| err.to_string())
            .and_then(|json| fs::write(&self.path, json).map_err(|err| err.to_string()));
        if let Err(reason) = written {
            tracing::warn!(
                path = %self.path.display(),
                %reason,
                "failed to persist best performer"
            );
        }
    }

    /// Removes the backing file.
    pub fn clear(&self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), %err, "nothing to clear");
        }
    }
}
