//! Status snapshot persistence port trait.

use crate::domain::error::RollstitchError;
use serde_json::{Map, Value};

/// Port for the status snapshot shared with the dashboard.
///
/// The snapshot is an open JSON object; the collector only owns its
/// `data_inventory` key and leaves the rest untouched.
pub trait StatusPort {
    fn load(&self) -> Result<Map<String, Value>, RollstitchError>;

    fn save(&self, status: &Map<String, Value>) -> Result<(), RollstitchError>;

    /// Replace one top-level key, keeping everything else in the snapshot.
    fn update_key(&self, key: &str, value: Value) -> Result<(), RollstitchError> {
        let mut status = self.load()?;
        status.insert(key.to_string(), value);
        self.save(&status)
    }
}
