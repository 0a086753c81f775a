use anyhow::{Context, Result};
use crudgen::MigrationStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the workspace directory name.
pub const WORKSPACE_ENV: &str = "CRUDGEN_WORKSPACE";

/// Project context for crudgen operations
pub struct ProjectContext {
    /// Root directory of the project (where Cargo.toml is)
    pub project_root: PathBuf,
    /// Metadata workspace directory (default `.crudgen`)
    pub workspace_dir: PathBuf,
    /// Path to config file inside the workspace
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: Option<CrudgenConfig>,
}

/// Configuration stored in .crudgen/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrudgenConfig {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub generator: GeneratorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Directories searched for entity structs, relative to the project root
    #[serde(default = "default_scan_dirs")]
    pub dirs: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            dirs: default_scan_dirs(),
        }
    }
}

fn default_scan_dirs() -> Vec<String> {
    vec!["src".to_string(), "demos".to_string()]
}

/// Settings consumed by the (future) UI code generator. Recorded here so a
/// project carries them from day one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "admin/src/generated".to_string()
}

impl ProjectContext {
    /// Find and load project context from current directory or ancestors
    pub fn find() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::find_from(&current_dir)
    }

    /// Find project context starting from the given directory
    pub fn find_from(start: &Path) -> Result<Self> {
        let project_root = Self::find_project_root(start)?;
        Self::from_root(project_root)
    }

    /// Create context from a known project root
    pub fn from_root(project_root: PathBuf) -> Result<Self> {
        let workspace_name =
            std::env::var(WORKSPACE_ENV).unwrap_or_else(|_| ".crudgen".to_string());
        let workspace_dir = project_root.join(workspace_name);
        let config_path = workspace_dir.join("config.toml");

        let config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config.toml")?;
            let config: CrudgenConfig =
                toml::from_str(&content).context("Failed to parse config.toml")?;
            Some(config)
        } else {
            None
        };

        Ok(Self {
            project_root,
            workspace_dir,
            config_path,
            config,
        })
    }

    /// Find project root by looking for Cargo.toml
    fn find_project_root(start: &Path) -> Result<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join("Cargo.toml").exists() {
                return Ok(current);
            }

            if !current.pop() {
                anyhow::bail!(
                    "Could not find Cargo.toml in {start:?} or any parent directory. \
                     Are you in a Rust project?"
                );
            }
        }
    }

    /// The migration store rooted at this project's workspace
    pub fn store(&self) -> MigrationStore {
        MigrationStore::new(&self.workspace_dir)
    }

    /// Check if crudgen is initialized in this project
    pub fn is_initialized(&self) -> bool {
        self.config_path.exists() && self.store().is_initialized()
    }

    /// Directories to scan for entity structs
    pub fn scan_dirs(&self) -> Vec<String> {
        self.config
            .as_ref()
            .map(|c| c.scan.dirs.clone())
            .unwrap_or_else(default_scan_dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CrudgenConfig::default();
        assert_eq!(config.scan.dirs, vec!["src", "demos"]);
        assert_eq!(config.generator.output_dir, "admin/src/generated");
    }

    #[test]
    fn test_config_serialization() {
        let config = CrudgenConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("dirs"));
        assert!(toml_str.contains("output_dir"));

        let back: CrudgenConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.scan.dirs, config.scan.dirs);
    }

    #[test]
    fn test_find_project_root_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        let nested = dir.path().join("src").join("models");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = ProjectContext::find_from(&nested).unwrap();
        assert_eq!(ctx.project_root, dir.path());
        assert!(!ctx.is_initialized());
    }
}
