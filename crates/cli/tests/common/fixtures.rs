//! Whitelist fixtures for integration tests

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary whitelist root plus a config file with no settle delay
pub struct Whitelist {
    dir: TempDir,
    root: PathBuf,
    config: PathBuf,
}

impl Whitelist {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let root = dir.path().join("whitelist");
        fs::create_dir(&root)?;
        let config = dir.path().join("config.toml");
        fs::write(&config, "[sweep]\nthreads = 2\n\n[watch]\nsettle_ms = 0\n")?;
        Ok(Self { dir, root, config })
    }

    /// Directory that holds the whitelist and the config file
    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_arg(&self) -> String {
        self.root.display().to_string()
    }

    pub fn config_arg(&self) -> String {
        self.config.display().to_string()
    }

    /// Add an already-decompiled version to a library
    pub fn add_version(&self, library: &str, version: &str, files: &[(&str, &str)]) -> Result<PathBuf> {
        let lib = self.root.join(library);
        fs::create_dir_all(&lib)?;
        fs::write(lib.join(format!("{version}.jar")), b"")?;
        let content = lib.join(version);
        fs::create_dir_all(&content)?;
        for (path, body) in files {
            let file = content.join(path);
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(file, body)?;
        }
        Ok(content)
    }

    pub fn report(&self, library: &str, version: &str) -> PathBuf {
        self.root.join(library).join(version).join("diff.txt")
    }
}
