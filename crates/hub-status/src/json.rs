//! JSON text and typed value convenience layer
//!
//! These helpers only marshal through [`Status::set`] and [`Status::get`];
//! they carry no contracts of their own.

use hub_core::{Revision, StatusResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Status;

impl Status {
    /// Parse `json` and write it at `url`
    pub fn set_json(&self, url: &str, json: &str, expected: Revision) -> StatusResult<u64> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        self.set(url, value, expected)
    }

    /// Read the value at `url` as JSON text together with its revision
    pub fn get_json(&self, url: &str) -> StatusResult<(String, u64)> {
        let entry = self.get(url)?;
        Ok((serde_json::to_string(&entry.value)?, entry.revision))
    }

    /// Serialize `value` and write it at `url`
    pub fn set_value<T: Serialize + ?Sized>(
        &self,
        url: &str,
        value: &T,
        expected: Revision,
    ) -> StatusResult<u64> {
        self.set(url, serde_json::to_value(value)?, expected)
    }

    /// Read the value at `url` into `T` together with its revision
    pub fn get_value<T: DeserializeOwned>(&self, url: &str) -> StatusResult<(T, u64)> {
        let entry = self.get(url)?;
        Ok((serde_json::from_value(entry.value)?, entry.revision))
    }
}
