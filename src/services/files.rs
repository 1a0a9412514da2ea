//! File I/O for the environment transport files.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::trace;

pub trait FileService {
    /// Write `content` to `path`, replacing anything already there.
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Remove the file at `path`. A missing file is not an error.
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Mode of the transport files; they carry the host environment.
#[cfg(unix)]
const PRIVATE_FILE_MODE: u32 = 0o600;

/// Reads and writes the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileService;

impl FileService for LocalFileService {
    fn write(&self, path: &Path, content: &str) -> Result<()> {
        trace!(path = %path.display(), bytes = content.len(), "files:write");
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(PRIVATE_FILE_MODE);
        }

        let mut file = options
            .open(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        // An existing file keeps its old mode through open(), so tighten it.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(PRIVATE_FILE_MODE))
                .with_context(|| format!("Failed to restrict permissions of {}", path.display()))?;
        }
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                trace!(path = %path.display(), "files:removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(path = %path.display(), "files:already absent");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}
