//! On-disk project registry: a single JSON document
//! tracking every project this machine has analyzed, keyed by both
//! name and absolute path so `--project` can accept either.

use std::fs;
use std::path::{Path, PathBuf};

use codegraph_core::{project_id_for_path, CodeGraphError, ProjectId, Result};
use serde::{Deserialize, Serialize};

const REGISTRY_FILE: &str = "projects.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    pub id: ProjectId,
    pub path: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProjectRegistry {
    pub projects: Vec<ProjectEntry>,
}

impl ProjectRegistry {
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(REGISTRY_FILE);
        match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(CodeGraphError::from),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(CodeGraphError::Io(e)),
        }
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        fs::create_dir_all(config_dir).map_err(CodeGraphError::Io)?;
        let path = config_dir.join(REGISTRY_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(CodeGraphError::Io)
    }

    /// Finds a project by its registry name or its derived/registered id.
    pub fn find(&self, name_or_id: &str) -> Option<&ProjectEntry> {
        self.projects
            .iter()
            .find(|p| p.name == name_or_id || p.id == name_or_id)
    }

    /// Registers `path` under `name`, deriving a stable id from the
    /// absolute path. Re-registering the same path updates `updated_at`
    /// in place instead of creating a duplicate entry, since name and
    /// path are both meant to stay unique.
    pub fn register(&mut self, name: &str, path: &Path) -> Result<ProjectEntry> {
        let absolute = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .to_string();
        let id = project_id_for_path(&absolute);
        let now = chrono::Utc::now();

        if let Some(existing) = self
            .projects
            .iter_mut()
            .find(|p| p.path == absolute || p.name == name)
        {
            existing.name = name.to_string();
            existing.path = absolute;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let entry = ProjectEntry {
            name: name.to_string(),
            id,
            path: absolute,
            created_at: now,
            updated_at: now,
        };
        self.projects.push(entry.clone());
        Ok(entry)
    }
}

pub fn registry_dir() -> PathBuf {
    codegraph_core::Settings::default_config_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn register_then_find_by_name_and_id() {
        let mut registry = ProjectRegistry::default();
        let entry = registry.register("demo", Path::new("/tmp/demo-project")).unwrap();
        assert!(registry.find("demo").is_some());
        assert!(registry.find(&entry.id).is_some());
        assert!(registry.find("missing").is_none());
    }

    #[test]
    fn re_registering_same_path_updates_in_place() {
        let mut registry = ProjectRegistry::default();
        registry.register("demo", Path::new("/tmp/demo-project")).unwrap();
        registry.register("demo-renamed", Path::new("/tmp/demo-project")).unwrap();
        assert_eq!(registry.projects.len(), 1);
        assert_eq!(registry.projects[0].name, "demo-renamed");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let mut registry = ProjectRegistry::default();
        registry.register("demo", Path::new("/tmp/demo-project")).unwrap();
        registry.save(dir.path()).unwrap();

        let loaded = ProjectRegistry::load(dir.path()).unwrap();
        assert_eq!(loaded.projects.len(), 1);
        assert_eq!(loaded.projects[0].name, "demo");
    }

    #[test]
    fn load_missing_file_yields_empty_registry() {
        let dir = tempdir().unwrap();
        let registry = ProjectRegistry::load(dir.path()).unwrap();
        assert!(registry.projects.is_empty());
    }
}
