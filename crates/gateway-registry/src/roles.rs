//! `RoleRegistry`: a read-through, file-watched view of configured roles
//! (`spec.md` §3, §4.7).

use arc_swap::ArcSwap;
use gateway_core::model::RoleInstance;
use gateway_core::ArrayFamily;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct RolesFile {
    #[serde(default)]
    roles: Vec<RoleInstance>,
}

/// Snapshot-style reads; updates are atomic replacements under an
/// `ArcSwap` so handlers never take a lock on the read path
/// (`spec.md` §5, "StorageRegistry / RoleRegistry snapshots").
pub struct RoleRegistry {
    snapshot: ArcSwap<Vec<RoleInstance>>,
    _watch: Option<gateway_fswatch::FileWatchHandle>,
}

impl RoleRegistry {
    pub fn from_instances(roles: Vec<RoleInstance>) -> Self {
        Self {
            snapshot: ArcSwap::from(Arc::new(roles)),
            _watch: None,
        }
    }

    /// Loads from a YAML file and keeps the snapshot fresh via a background
    /// file watcher for the lifetime of the returned registry.
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
                    Ok(roles) => {
                        registry.snapshot.store(Arc::new(roles));
                        info!(path = %watch_path.display(), "role registry reloaded");
                    }
                    Err(e) => {
                        error!(error = %e, path = %watch_path.display(), "failed to reload role registry")
                    }
                }
            });
            if let Err(e) = &watch {
                error!(error = %e, path = %path.display(), "failed to establish role registry watch");
            }

            Self {
                snapshot: ArcSwap::from(Arc::new(initial)),
                _watch: watch.ok(),
            }
        }))
    }

    pub fn all(&self) -> Vec<RoleInstance> {
        (**self.snapshot.load()).clone()
    }

    /// The configured quota cap in KB for `(name, family, array_id, pool)`,
    /// or `None` if no such role instance is configured (`spec.md` §4.1
    /// consults this to bound `ApproveRequest`).
    pub fn cap_for(&self, name: &str, family: ArrayFamily, array_id: &str, pool: &str) -> Option<u64> {
        self.snapshot
            .load()
            .iter()
            .find(|r| r.name == name && r.family == family && r.array_id == array_id && r.pool == pool)
            .map(|r| r.quota_kb)
    }

    /// All role instances bound to `names`, used to compute the best (first
    /// matching) cap when a tenant holds several roles.
    pub fn caps_for_any(&self, names: &[String], family: ArrayFamily, array_id: &str, pool: &str) -> Option<u64> {
        names
            .iter()
            .find_map(|n| self.cap_for(n, family, array_id, pool))
    }

    /// Same lookup as `caps_for_any` but also returns the matching role's
    /// name, used to record which role a volume was approved under
    /// (`spec.md` §4, `VolumesQuery`).
    pub fn best_role_for_any(&self, names: &[String], family: ArrayFamily, array_id: &str, pool: &str) -> Option<(String, u64)> {
        names
            .iter()
            .find_map(|n| self.cap_for(n, family, array_id, pool).map(|cap| (n.clone(), cap)))
    }
}

fn load(path: &Path) -> anyhow::Result<Vec<RoleInstance>> {
    let raw = std::fs::read_to_string(path)?;
    let file: RolesFile = serde_yaml::from_str(&raw)?;
    Ok(file.roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_cap_for_exact_scope() {
        let roles = vec![RoleInstance {
            name: "CA-medium".into(),
            family: ArrayFamily::PowerFlex,
            array_id: "542a2d5f5122210f".into(),
            pool: "bronze".into(),
            quota_kb: 9 * 1024 * 1024,
        }];
        let registry = RoleRegistry::from_instances(roles);
        assert_eq!(
            registry.cap_for("CA-medium", ArrayFamily::PowerFlex, "542a2d5f5122210f", "bronze"),
            Some(9 * 1024 * 1024)
        );
        assert_eq!(
            registry.cap_for("CA-medium", ArrayFamily::PowerFlex, "other-sys", "bronze"),
            None
        );
    }
}
