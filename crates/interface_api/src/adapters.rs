//! Filesystem adapters

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use core_kernel::{DomainPort, PortError};
use domain_tiss::ports::FileStore;

/// Writes generated XML artifacts under a root directory
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DomainPort for LocalFileStore {}

impl FileStore for LocalFileStore {
    fn save(&self, bytes: &[u8], name: &str) -> Result<String, PortError> {
        let file_name = Path::new(name);
        let is_plain_name = file_name.file_name().map(|n| n == file_name.as_os_str()) == Some(true);
        if !is_plain_name {
            return Err(PortError::validation(format!("Invalid artifact name: {}", name)));
        }

        fs::create_dir_all(&self.root).map_err(|e| {
            PortError::storage(format!("Cannot create {}", self.root.display()), e)
        })?;

        let path = self.root.join(file_name);
        fs::write(&path, bytes)
            .map_err(|e| PortError::storage(format!("Cannot write {}", path.display()), e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Artifact stored");
        Ok(path.to_string_lossy().into_owned())
    }
}
