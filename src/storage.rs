//! Whole-file persistence helpers shared by the JSON and TOML backed stores.
//!
//! Every store in this crate rewrites its file wholesale on each change. The
//! write goes to a sibling temp file which is then renamed over the target,
//! so readers never observe a half-written file.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed toml in {path}: {source}")]
    TomlRead {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode toml for {path}: {source}")]
    TomlWrite {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Reads a JSON file, treating a missing file as `T::default()`.
pub(crate) fn load_json_or_default<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => return Err(StoreError::io(path, err)),
    };
    serde_json::from_slice(&contents).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a TOML file, treating a missing file as `T::default()`.
pub(crate) fn load_toml_or_default<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => return Err(StoreError::io(path, err)),
    };
    toml::from_str(&contents).map_err(|source| StoreError::TomlRead {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn encode_json<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn encode_toml<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>, StoreError> {
    toml::to_string(value)
        .map(String::into_bytes)
        .map_err(|source| StoreError::TomlWrite {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) async fn write_atomically(path: &Path, contents: Vec<u8>) -> Result<(), StoreError> {
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|err| StoreError::io(&tmp, err))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|err| StoreError::io(path, err))
}

pub(crate) fn write_atomically_blocking(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let tmp = temp_path(path);
    std::fs::write(&tmp, contents).map_err(|err| StoreError::io(&tmp, err))?;
    std::fs::rename(&tmp, path).map_err(|err| StoreError::io(path, err))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
pub(crate) fn create_temp_root(test_name: &str) -> PathBuf {
    let mut root = std::env::temp_dir();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    root.push(format!("backoffice-{}-{}", test_name, nanos));
    std::fs::create_dir_all(&root).expect("create temp dir");
    root
}
