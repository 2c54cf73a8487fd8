//! Label-to-code actuation table.
//!
//! Maps a resolved class label to the integer code written into the PLC's
//! data block. The table is part of the deployment's protocol contract and
//! is loaded from configuration; the wire width and signedness of the code
//! live with the PLC link, not here.

use std::collections::HashMap;
use thiserror::Error;

/// Encoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The resolved label has no entry in the actuation table.
    ///
    /// This is a configuration inconsistency (detector class set vs.
    /// actuation table), not a transient I/O condition — callers must
    /// surface it loudly rather than silently defaulting.
    #[error("label '{0}' has no actuation code")]
    UnknownLabel(String),
}

/// Deployment-specific mapping from class label to actuation code.
#[derive(Debug, Clone, Default)]
pub struct ActuationTable {
    codes: HashMap<String, i64>,
}

impl ActuationTable {
    /// Build a table from `(label, code)` pairs.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(|(l, c)| (l.into(), c)).collect(),
        }
    }

    /// Code for a label, if configured.
    #[inline]
    pub fn code(&self, label: &str) -> Option<i64> {
        self.codes.get(label).copied()
    }

    /// True if the label has an actuation code.
    #[inline]
    pub fn contains(&self, label: &str) -> bool {
        self.codes.contains_key(label)
    }

    /// Iterate over the configured labels.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }

    /// Encode a resolved label into its actuation code.
    ///
    /// `None` (no detections this frame) encodes to `Ok(None)`; whether
    /// that suppresses the PLC write or substitutes an idle code is the
    /// orchestrator's configured choice.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnknownLabel`] if `label` is present but
    /// absent from the table.
    pub fn encode(&self, label: Option<&str>) -> Result<Option<i64>, EncodeError> {
        match label {
            None => Ok(None),
            Some(l) => self
                .code(l)
                .map(Some)
                .ok_or_else(|| EncodeError::UnknownLabel(l.to_string())),
        }
    }
}
