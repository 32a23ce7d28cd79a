//! Compose manifest locator

use crate::error::{Result, StevedoreError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default compose file names, in lookup order
pub const DEFAULT_COMPOSE_FILES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

/// The parts of a compose file Stevedore cares about
#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    services: BTreeMap<String, serde_yaml::Value>,
}

/// A located and validated compose manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeManifest {
    /// Path of the manifest file
    pub path: PathBuf,
    /// Project name, if the manifest declares one
    pub name: Option<String>,
    /// Declared service names, sorted
    pub services: Vec<String>,
}

impl ComposeManifest {
    /// Find the compose file in a directory
    pub fn find_compose_file(dir: &Path) -> Option<PathBuf> {
        DEFAULT_COMPOSE_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Locate and validate the manifest of a deployment directory
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(StevedoreError::MissingDeployment(dir.to_path_buf()));
        }

        let path = Self::find_compose_file(dir)
            .ok_or_else(|| StevedoreError::MissingManifest(dir.to_path_buf()))?;

        let content = std::fs::read_to_string(&path)?;
        let mut manifest = Self::parse_str(&content)?;
        manifest.path = path;
        Ok(manifest)
    }

    /// Parse manifest content. The returned path is empty.
    pub fn parse_str(content: &str) -> Result<Self> {
        let file: ComposeFile = serde_yaml::from_str(content)
            .map_err(|e| StevedoreError::InvalidManifest(format!("Failed to parse YAML: {}", e)))?;

        if file.services.is_empty() {
            return Err(StevedoreError::InvalidManifest(
                "no services declared".to_string(),
            ));
        }

        Ok(Self {
            path: PathBuf::new(),
            name: file.name,
            services: file.services.into_keys().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"
name: shop
services:
  web:
    image: nginx
    ports:
      - "8080:80"
  db:
    image: postgres
"#;

    #[test]
    fn test_parse_services() {
        let manifest = ComposeManifest::parse_str(MANIFEST).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("shop"));
        assert_eq!(manifest.services, vec!["db", "web"]);
    }

    #[test]
    fn test_find_prefers_compose_yaml() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("docker-compose.yml"), MANIFEST).unwrap();
        std::fs::write(temp.path().join("compose.yaml"), MANIFEST).unwrap();

        let found = ComposeManifest::find_compose_file(temp.path()).unwrap();
        assert_eq!(found, temp.path().join("compose.yaml"));
    }

    #[test]
    fn test_load_from_directory() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("docker-compose.yml"), MANIFEST).unwrap();

        let manifest = ComposeManifest::load(temp.path()).unwrap();
        assert_eq!(manifest.path, temp.path().join("docker-compose.yml"));
        assert_eq!(manifest.services.len(), 2);
    }

    #[test]
    fn test_missing_directory() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope");

        let result = ComposeManifest::load(&missing);
        assert!(matches!(result, Err(StevedoreError::MissingDeployment(p)) if p == missing));
    }

    #[test]
    fn test_missing_manifest() {
        let temp = tempdir().unwrap();
        let result = ComposeManifest::load(temp.path());
        assert!(matches!(result, Err(StevedoreError::MissingManifest(_))));
    }

    #[test]
    fn test_invalid_manifest() {
        assert!(matches!(
            ComposeManifest::parse_str("services: [unclosed"),
            Err(StevedoreError::InvalidManifest(_))
        ));
        assert!(matches!(
            ComposeManifest::parse_str("version: '3'\n"),
            Err(StevedoreError::InvalidManifest(_))
        ));
    }
}
