use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Local project directory job outputs are fetched into
    pub local_root: PathBuf,
    /// Directory on the remote site the jobs run in
    pub remote_root: PathBuf,
    /// Where iteration manifests live; defaults to `<local_root>/manifests`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_dir: Option<PathBuf>,
}

impl ProjectConfig {
    pub fn manifest_dir(&self) -> PathBuf {
        self.manifest_dir.clone().unwrap_or_else(|| self.local_root.join("manifests"))
    }
}
