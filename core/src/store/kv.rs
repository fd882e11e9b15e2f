// larder/src/store/kv.rs

use crate::error::{LarderError, LarderResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable, string-keyed device storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
  async fn get_string(&self, key: &str) -> LarderResult<Option<String>>;
  async fn set_string(&self, key: &str, value: &str) -> LarderResult<()>;
}

/// Process-local map. Survives a tracker restart as long as the value itself
/// is kept alive, which is what tests use to simulate an app relaunch.
#[derive(Debug, Default)]
pub struct MemoryKv {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn raw(&self, key: &str) -> Option<String> {
    self.entries.lock().get(key).cloned()
  }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
  async fn get_string(&self, key: &str) -> LarderResult<Option<String>> {
    Ok(self.raw(key))
  }

  async fn set_string(&self, key: &str, value: &str) -> LarderResult<()> {
    self.entries.lock().insert(key.to_string(), value.to_string());
    Ok(())
  }
}

/// One file per key under a directory. Writes go through a temporary file and
/// a rename so a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileKv {
  dir: PathBuf,
}

impl FileKv {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path_for(&self, key: &str) -> PathBuf {
    let file_name: String = key
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
      .collect();
    self.dir.join(format!("{file_name}.json"))
  }
}

fn local_err(key: &str, source: std::io::Error) -> LarderError {
  LarderError::LocalStorage {
    key: key.to_string(),
    source,
  }
}

#[async_trait]
impl KeyValueStore for FileKv {
  async fn get_string(&self, key: &str) -> LarderResult<Option<String>> {
    match tokio::fs::read_to_string(self.path_for(key)).await {
      Ok(contents) => Ok(Some(contents)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(local_err(key, e)),
    }
  }

  async fn set_string(&self, key: &str, value: &str) -> LarderResult<()> {
    let path = self.path_for(key);
    let tmp = path.with_extension("json.tmp");
    tokio::fs::create_dir_all(&self.dir).await.map_err(|e| local_err(key, e))?;
    tokio::fs::write(&tmp, value).await.map_err(|e| local_err(key, e))?;
    tokio::fs::rename(&tmp, &path).await.map_err(|e| local_err(key, e))?;
    debug!(key, path = %path.display(), bytes = value.len(), "Local value written.");
    Ok(())
  }
}
