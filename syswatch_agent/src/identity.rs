//! Durable host identity: a small JSON file `{"id": "<uuid>"}` created on
//! first run and read on every run after.
//! Default location: $XDG_CONFIG_HOME/syswatch/syswatch_id.json (fallback
//! ~/.config/syswatch/syswatch_id.json).

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const IDENTITY_FILE: &str = "syswatch_id.json";

#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("identity file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("identity file {0} holds an empty id")]
    Empty(PathBuf),
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("syswatch")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("syswatch")
    }
}

pub fn default_identity_path() -> PathBuf {
    config_dir().join(IDENTITY_FILE)
}

/// Read the id at `path`, creating the file with a fresh v4 UUID if it
/// does not exist. An existing file that cannot be read or parsed is an
/// error; its id is never replaced.
pub fn load_or_create(path: &Path) -> Result<String, IdentityError> {
    match read(path) {
        Err(IdentityError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {}
        other => return other,
    }

    let io_err = |source: std::io::Error| IdentityError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let id = uuid::Uuid::new_v4().to_string();
    let data = serde_json::to_vec(&IdentityFile { id: id.clone() }).map_err(|source| {
        IdentityError::Corrupt {
            path: path.to_path_buf(),
            source,
        }
    })?;
    // create_new: if another agent won the race, use its id
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut f) => {
            f.write_all(&data).map_err(io_err)?;
            f.sync_all().map_err(io_err)?;
            info!("created new system id {id} in {}", path.display());
            Ok(id)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => read(path),
        Err(e) => Err(io_err(e)),
    }
}

fn read(path: &Path) -> Result<String, IdentityError> {
    let text = fs::read_to_string(path).map_err(|source| IdentityError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: IdentityFile =
        serde_json::from_str(&text).map_err(|source| IdentityError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    let id = file.id.trim();
    if id.is_empty() {
        return Err(IdentityError::Empty(path.to_path_buf()));
    }
    Ok(id.to_string())
}
