//! Cluster snapshot files.

use std::path::Path;

use anyhow::{Context, Result};
use warden_controller::ClusterSnapshot;

/// Read a YAML snapshot.
pub fn load_snapshot(path: &Path) -> Result<ClusterSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))
}

/// Write a snapshot as YAML, replacing the file.
pub fn save_snapshot(path: &Path, snapshot: &ClusterSnapshot) -> Result<()> {
    let content = serde_yaml::to_string(snapshot).context("failed to serialize snapshot")?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write snapshot {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.yaml");
        std::fs::write(
            &path,
            "workloads:\n  - name: web\n    namespace: prod\n    containers:\n      - name: app\n        image: acme/app:1\n",
        )
        .unwrap();

        let snap = load_snapshot(&path).unwrap();
        assert_eq!(snap.workloads.len(), 1);
        save_snapshot(&path, &snap).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snap);
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = load_snapshot(Path::new("/nonexistent/cluster.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/cluster.yaml"));
    }
}
