//! Session snapshots.
//!
//! A snapshot captures everything needed to resume a session in another
//! process: the full config and the cookie jar. Hooks, transport pools and
//! the proxy source are not part of it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::cookies::Cookie;
use crate::error::Error;

/// Serializable session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub config: Config,
    pub state: SessionState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookiejar_cookies: Vec<Cookie>,
}

impl SessionSnapshot {
    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] for malformed input.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the snapshot as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), Error> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| Error::io(path, e))?;
        debug!(path = %path.display(), cookies = self.state.cookiejar_cookies.len(), "saved session");
        Ok(())
    }

    /// Reads a snapshot written by [`write_to`](Self::write_to).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read and
    /// [`Error::Snapshot`] when it is not a valid snapshot.
    pub fn read_from(path: &Path) -> Result<Self, Error> {
        let json = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&json)
    }
}
