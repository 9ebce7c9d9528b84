use std::fmt;

use serde::{Deserialize, Serialize};

/// Decodes a right-padded on-chain identifier (a `bytes5` keycode or a
/// `bytes32` role name) into text. NUL bytes are dropped wherever they occur.
pub fn decode_padded_ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace('\0', "")
}

/// Short identifier a module reports for itself, stable across upgrades.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keycode(String);

impl Keycode {
    pub fn new(keycode: impl Into<String>) -> Self {
        Self(keycode.into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(decode_padded_ascii(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Keycode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
