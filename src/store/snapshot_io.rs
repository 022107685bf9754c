//! Store snapshot persistence as pretty JSON.
//!
//! Writes go to a sibling temporary file that is renamed over the target, so an
//! interrupted save leaves the previous snapshot intact.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::StoreSnapshot;

/// File name used when the configured snapshot location is a directory.
pub const SNAPSHOT_FILENAME: &str = "telemetry.json";

fn invalid_data(e: serde_json::Error) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Resolves a configured location to the snapshot file: an existing directory gets
/// [SNAPSHOT_FILENAME] appended, anything else is used as-is.
pub fn snapshot_file(location: &Path) -> PathBuf {
  if location.is_dir() {
    location.join(SNAPSHOT_FILENAME)
  } else {
    location.to_path_buf()
  }
}

/// Saves `snapshot` to `path`, creating parent directories as needed.
#[instrument(level = "trace", skip(snapshot))]
pub fn save_snapshot(path: &Path, snapshot: &StoreSnapshot) -> io::Result<()> {
  let json = serde_json::to_vec_pretty(snapshot).map_err(invalid_data)?;
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)?;
  }
  let mut staging = path.as_os_str().to_owned();
  staging.push(".tmp");
  let staging = PathBuf::from(staging);
  std::fs::write(&staging, json)?;
  std::fs::rename(&staging, path)?;
  debug!(
    devices = snapshot.devices.len(),
    nodes = snapshot.nodes.len(),
    pipelines = snapshot.pipelines.len(),
    "snapshot written"
  );
  Ok(())
}

/// Loads the snapshot at `path`. Missing files and invalid JSON are errors.
#[instrument(level = "trace")]
pub fn load_snapshot(path: &Path) -> io::Result<StoreSnapshot> {
  let bytes = std::fs::read(path)?;
  serde_json::from_slice(&bytes).map_err(invalid_data)
}

/// Like [load_snapshot], but a missing file yields `None`.
pub fn load_snapshot_if_present(path: &Path) -> io::Result<Option<StoreSnapshot>> {
  match load_snapshot(path) {
    Ok(snapshot) => Ok(Some(snapshot)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(e),
  }
}
