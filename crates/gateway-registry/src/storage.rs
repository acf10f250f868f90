//! `StorageRegistry`: a read-through, file-watched view of configured
//! storage arrays (`spec.md` §3, §4.7).

use arc_swap::ArcSwap;
use gateway_core::model::StorageSystemRecord;
use gateway_core::ArrayFamily;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct StorageFile {
    #[serde(default)]
    storage: Vec<StorageSystemRecord>,
}

pub struct StorageRegistry {
    snapshot: ArcSwap<Vec<StorageSystemRecord>>,
    _watch: Option<gateway_fswatch::FileWatchHandle>,
}

impl StorageRegistry {
    pub fn from_records(records: Vec<StorageSystemRecord>) -> Self {
        Self {
            snapshot: ArcSwap::from(Arc::new(records)),
            _watch: None,
        }
    }

    pub fn watch_file(path: impl AsRef<Path>) -> anyhow::Result<Arc<Self>> {
        let path: PathBuf = path.as_ref().to_owned();
        let initial = load(&path)?;

        Ok(Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let watch_path = path.clone();
            let watch = gateway_fswatch::watch_file(&path, move |_| {
                let Some(registry) = weak.upgrade() else {
                    return;
                };
                match load(&watch_path) {
                    Ok(records) => {
                        registry.snapshot.store(Arc::new(records));
                        info!(path = %watch_path.display(), "storage registry reloaded");
                    }
                    Err(e) => {
                        error!(error = %e, path = %watch_path.display(), "failed to reload storage registry")
                    }
                }
            });
            if let Err(e) = &watch {
                error!(error = %e, path = %path.display(), "failed to establish storage registry watch");
            }

            Self {
                snapshot: ArcSwap::from(Arc::new(initial)),
                _watch: watch.ok(),
            }
        }))
    }

    pub fn all(&self) -> Vec<StorageSystemRecord> {
        (**self.snapshot.load()).clone()
    }

    /// Credentials and endpoint for one array id (`spec.md` §4.2 step 2).
    pub fn get(&self, family: ArrayFamily, array_id: &str) -> Option<StorageSystemRecord> {
        self.snapshot
            .load()
            .iter()
            .find(|r| r.family == family && r.array_id == array_id)
            .cloned()
    }

    pub fn default_for(&self, family: ArrayFamily) -> Option<StorageSystemRecord> {
        self.snapshot
            .load()
            .iter()
            .find(|r| r.family == family && r.is_default)
            .cloned()
    }
}

fn load(path: &Path) -> anyhow::Result<Vec<StorageSystemRecord>> {
    let raw = std::fs::read_to_string(path)?;
    let file: StorageFile = serde_yaml::from_str(&raw)?;
    Ok(file.storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(array_id: &str, is_default: bool) -> StorageSystemRecord {
        StorageSystemRecord {
            family: ArrayFamily::PowerFlex,
            array_id: array_id.into(),
            username: "admin".into(),
            password: "secret".into(),
            endpoint: "https://10.0.0.1".into(),
            insecure: true,
            is_default,
        }
    }

    #[test]
    fn looks_up_by_family_and_id() {
        let registry = StorageRegistry::from_records(vec![record("12345", false), record("99999", true)]);
        assert!(registry.get(ArrayFamily::PowerFlex, "12345").is_some());
        assert!(registry.get(ArrayFamily::PowerFlex, "missing").is_none());
        assert_eq!(
            registry.default_for(ArrayFamily::PowerFlex).unwrap().array_id,
            "99999"
        );
    }
}
