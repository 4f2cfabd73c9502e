//! JSON file status snapshot adapter.

use crate::domain::error::RollstitchError;
use crate::ports::status_port::StatusPort;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Key under which the collector publishes its inventory.
pub const DATA_INVENTORY_KEY: &str = "data_inventory";

pub struct JsonStatusAdapter {
    path: PathBuf,
}

impl JsonStatusAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusPort for JsonStatusAdapter {
    fn load(&self) -> Result<Map<String, Value>, RollstitchError> {
        match read_json::<Value>(&self.path)? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(RollstitchError::Status {
                reason: format!("{} does not hold a JSON object", self.path.display()),
            }),
        }
    }

    fn save(&self, status: &Map<String, Value>) -> Result<(), RollstitchError> {
        write_json(&self.path, status)
    }
}

/// Read a JSON document; `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, RollstitchError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| RollstitchError::Status {
            reason: format!("failed to parse {}: {}", path.display(), e),
        })
}

/// Write pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), RollstitchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|e| RollstitchError::Status {
        reason: format!("failed to serialise {}: {}", path.display(), e),
    })?;
    fs::write(path, content)?;
    Ok(())
}
