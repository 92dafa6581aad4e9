// Reader options, loadable from a JSON file

use crate::core::error::Result;
use crate::core::events::CodeDecoding;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Decode a code after each digital edge. Off by default.
    pub code_decoding: Option<CodeDecoding>,
    /// Take the recording time from a `_YYMMDD_HHMMSS` file name suffix.
    pub parse_rec_datetime: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            code_decoding: None,
            parse_rec_datetime: true,
        }
    }
}

impl ReadOptions {
    pub fn from_json_str(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let options = Self::from_json_str(&data)?;
        info!("Read options loaded from {}", path.display());
        Ok(options)
    }
}
