//! # Error Types
//!
//! Errors for the wire codec, the client lifecycle and configuration.
//!
//! None of the wire errors are fatal to a tick. A bad record is dropped and
//! the rest of the batch is processed.

use thiserror::Error;

use crate::client::GameState;

/// Errors produced while decoding inbound wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Field count does not match the layout selected by the type tag.
    #[error("arity mismatch for {kind}: expected {expected} fields, got {actual}")]
    Arity {
        /// Layout name.
        kind: &'static str,
        /// Expected field count.
        expected: usize,
        /// Actual field count.
        actual: usize,
    },

    /// Field count outside a layout that has optional trailing fields.
    #[error("arity mismatch for {kind}: expected {min} to {max} fields, got {actual}")]
    ArityRange {
        /// Layout name.
        kind: &'static str,
        /// Fewest fields accepted.
        min: usize,
        /// Most fields accepted.
        max: usize,
        /// Actual field count.
        actual: usize,
    },

    /// Type tag not recognised.
    #[error("unknown entity kind: {0}")]
    UnknownKind(String),

    /// A required field was null.
    #[error("missing required field {field} for {kind}")]
    MissingField {
        /// Layout name.
        kind: &'static str,
        /// Field name.
        field: &'static str,
    },

    /// A field held a value of the wrong type.
    #[error("invalid value in field {field} for {kind}")]
    InvalidField {
        /// Layout name.
        kind: &'static str,
        /// Field name.
        field: &'static str,
    },

    /// The message payload does not have the expected shape.
    #[error("malformed payload for {event}: {reason}")]
    MalformedPayload {
        /// Event name.
        event: String,
        /// What was wrong.
        reason: String,
    },

    /// Event name not in the catalog.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

impl WireError {
    /// Returns true for recoverable warnings, false for decode errors.
    ///
    /// Both are handled by dropping the record; the split only drives how
    /// loudly it is reported.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::UnknownKind(_) | Self::MissingField { .. } | Self::UnknownEvent(_)
        )
    }
}

/// Result type for wire decoding.
pub type WireResult<T> = Result<T, WireError>;

/// Errors from the client lifecycle state machine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// The requested transition is not allowed from the current state.
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current state.
        from: GameState,
        /// Requested state.
        to: GameState,
    },

    /// The operation needs an active session.
    #[error("no active session")]
    NotJoined,
}

/// Errors loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for the config schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
