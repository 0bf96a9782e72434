//! Log file identity keys
//!
//! Remote log files rotate hourly and carry their hour in the name, e.g.
//! `error/postgresql.log.2024-01-01-00`. The trailing `YYYY-MM-DD-HH` suffix
//! is the stable identity used to look up a file's cursor in the checkpoint.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the `YYYY-MM-DD-HH` suffix
const KEY_LEN: usize = 13;

/// Positions of the dash separators inside the suffix
const DASH_POSITIONS: [usize; 3] = [4, 7, 10];

/// Identity key of a log file, derived from its date-hour suffix
///
/// # Examples
///
/// ```
/// use log_harvester::identifier::FileKey;
///
/// let key = FileKey::derive("error/postgresql.log.2024-01-01-07").unwrap();
/// assert_eq!(key.as_str(), "2024-01-01-07");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    /// Derive the key from a file name
    ///
    /// The name must end with four digits, a dash, two digits, a dash, two
    /// digits, a dash and two digits. Nothing else about the name matters.
    ///
    /// # Errors
    ///
    /// Returns [`KeyDerivationError::MissingSuffix`] if the suffix is absent.
    pub fn derive(file_name: &str) -> Result<Self, KeyDerivationError> {
        let bytes = file_name.as_bytes();
        if bytes.len() < KEY_LEN {
            return Err(KeyDerivationError::MissingSuffix(file_name.to_string()));
        }

        let suffix = &bytes[bytes.len() - KEY_LEN..];
        let well_formed = suffix.iter().enumerate().all(|(i, b)| {
            if DASH_POSITIONS.contains(&i) {
                *b == b'-'
            } else {
                b.is_ascii_digit()
            }
        });

        if !well_formed {
            return Err(KeyDerivationError::MissingSuffix(file_name.to_string()));
        }

        // Suffix is pure ASCII, so slicing the str at this byte offset is valid
        Ok(Self(file_name[file_name.len() - KEY_LEN..].to_string()))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur during key derivation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyDerivationError {
    /// File name has no trailing date-hour suffix
    #[error("file name '{0}' does not end with a YYYY-MM-DD-HH suffix")]
    MissingSuffix(String),
}
