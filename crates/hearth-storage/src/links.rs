//! Link table - durable identity -> external account mapping.
//!
//! The whole table lives in a single JSON object keyed by identity string.
//! It is loaded once at startup and rewritten on every mutation, via a
//! temp-file-and-rename so a crash mid-write leaves the previous file intact.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};
use uuid::Uuid;

/// Durable store for identity -> external account links.
#[derive(Debug, Clone)]
pub struct LinkStore {
    path: PathBuf,
}

impl LinkStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the full link table.
    ///
    /// A missing file yields an empty map. Malformed entries are skipped
    /// individually; a partial load never aborts the whole load. Read errors
    /// are logged and yield an empty map.
    pub fn load(&self) -> HashMap<Uuid, i64> {
        match self.try_load() {
            Ok(links) => {
                debug!(count = links.len(), "Loaded link table");
                links
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to load link table: {e:#}");
                HashMap::new()
            }
        }
    }

    /// Overwrite the link table on disk.
    ///
    /// Failures are logged, never propagated; the previous durable state
    /// remains until the next successful save.
    pub fn save(&self, links: &HashMap<Uuid, i64>) {
        if let Err(e) = self.try_save(links) {
            warn!(path = %self.path.display(), "Failed to save link table: {e:#}");
        }
    }

    fn try_load(&self) -> Result<HashMap<Uuid, i64>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let object: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&raw).context("link table is not a JSON object")?;

        let mut links = HashMap::with_capacity(object.len());
        for (key, value) in object {
            let identity = match key.parse::<Uuid>() {
                Ok(id) => id,
                Err(e) => {
                    warn!(entry = %key, "Skipping link with invalid identity: {e}");
                    continue;
                }
            };
            match value.as_i64() {
                Some(external_id) => {
                    links.insert(identity, external_id);
                }
                None => {
                    warn!(entry = %key, "Skipping link with non-integer account id");
                }
            }
        }
        Ok(links)
    }

    fn try_save(&self, links: &HashMap<Uuid, i64>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        // Stable key order keeps the file diff-friendly.
        let object: BTreeMap<String, i64> = links
            .iter()
            .map(|(id, external)| (id.to_string(), *external))
            .collect();
        let json = serde_json::to_string_pretty(&object)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}
