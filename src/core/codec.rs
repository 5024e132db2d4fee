//! Save tokens: `{state, history, checkpointName}` as JSON, compressed with
//! LZ-String into a URL-safe string.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::state::StoryState;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("save token is empty")]
    Empty,
    #[error("save token could not be decompressed")]
    Decompress,
    #[error("save token is not valid UTF-16 text: {0}")]
    Utf16(#[from] std::string::FromUtf16Error),
    #[error("save token holds malformed save data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save data has no history")]
    EmptyHistory,
    #[error("save data refers to missing passage {0}")]
    UnknownPassage(u32),
}

/// Everything that survives a save: the state bag, the history and the
/// checkpoint label. Also the payload of a host history frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    pub state: StoryState,
    pub history: Vec<u32>,
    #[serde(rename = "checkpointName", default)]
    pub checkpoint_name: String,
}

impl SaveData {
    pub fn encode(&self) -> Result<String, PersistenceError> {
        encode(self)
    }

    /// The passage a restore lands on.
    pub fn last_passage(&self) -> Option<u32> {
        self.history.last().copied()
    }
}

pub fn encode(data: &SaveData) -> Result<String, PersistenceError> {
    let json = serde_json::to_string(data)?;
    Ok(lz_str::compress_to_encoded_uri_component(json.as_str()))
}

/// Decode a token, with or without the leading `#` of a location fragment.
///
/// URL-safe tokens are tried first, then the base64 alphabet that older
/// saves used.
pub fn decode(token: &str) -> Result<SaveData, PersistenceError> {
    let token = token.trim().trim_start_matches('#');
    if token.is_empty() {
        return Err(PersistenceError::Empty);
    }
    match decode_with(lz_str::decompress_from_encoded_uri_component(token)) {
        Ok(data) => Ok(data),
        Err(first) => decode_with(lz_str::decompress_from_base64(token)).map_err(|_| first),
    }
}

fn decode_with(raw: Option<Vec<u16>>) -> Result<SaveData, PersistenceError> {
    let raw = raw.ok_or(PersistenceError::Decompress)?;
    if raw.is_empty() {
        return Err(PersistenceError::Decompress);
    }
    let json = String::from_utf16(&raw)?;
    Ok(serde_json::from_str(&json)?)
}
