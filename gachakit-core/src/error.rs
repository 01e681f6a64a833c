use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::storage::StorageError;

/// Error outputs from `GachaKit`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GachaKitError {
    /// A resource could not be fetched or answered with a non-success status
    #[error("network_error: {error} for {url}")]
    NetworkError {
        /// The requested URL.
        url: String,
        /// The HTTP status code, if a response was received.
        status: Option<u16>,
        /// Details of the failure.
        error: String,
    },
    /// One or more of the initialization resources could not be fetched
    #[error("Failed to fetch initial assets: {}", .resources.join(", "))]
    AssetFetch {
        /// Names of every resource that failed.
        resources: Vec<String>,
    },
    /// A fetched resource has an unexpected shape
    #[error("{reason}")]
    InvalidData {
        /// The resource which failed validation.
        resource: String,
        /// Human readable description of the failure.
        reason: String,
    },
    /// The engine module could not be loaded. The engine's message is kept verbatim.
    #[error("{0}")]
    EngineLoad(String),
    /// The engine failed to initialize, prove or verify. The engine's message is kept verbatim.
    #[error("{0}")]
    Engine(String),
    /// The engine was requested without being loaded first
    #[error("engine module is not loaded, call `EngineLoader::acquire` first")]
    EngineNotLoaded,
    /// State required by the operation is missing
    #[error("{0}")]
    MissingPrerequisite(String),
    /// The provided configuration is not valid
    #[error("invalid_config: {0}")]
    InvalidConfig(String),
    /// Durable storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl GachaKitError {
    /// Classifies the error for the phase error fields.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkError { .. } | Self::AssetFetch { .. } => ErrorKind::Transport,
            Self::InvalidData { .. } | Self::InvalidConfig(_) => ErrorKind::Validation,
            Self::EngineLoad(_) | Self::Engine(_) | Self::EngineNotLoaded => {
                ErrorKind::Engine
            }
            Self::MissingPrerequisite(_) => ErrorKind::Precondition,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn invalid_data(resource: &str, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            resource: resource.to_string(),
            reason: reason.into(),
        }
    }
}

/// Broad classification of a failure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// A fetch failed or returned a non-success status.
    Transport,
    /// Fetched data was malformed or incomplete.
    Validation,
    /// The engine failed to load, initialize, prove or verify.
    Engine,
    /// The operation was started without the data it needs.
    Precondition,
    /// Durable storage failed.
    Storage,
}

/// The error recorded in a phase's error field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseError {
    /// What went wrong, broadly.
    pub kind: ErrorKind,
    /// The human readable message shown to the user.
    pub message: String,
}

impl PhaseError {
    /// Builds a phase error from its parts.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&GachaKitError> for PhaseError {
    fn from(error: &GachaKitError) -> Self {
        Self::new(error.kind(), error.to_string())
    }
}

impl From<GachaKitError> for PhaseError {
    fn from(error: GachaKitError) -> Self {
        Self::from(&error)
    }
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// How a store operation ended.
///
/// Operations never fail towards the caller: the error is recorded in the
/// phase's error field and mirrored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// A guard rejected the call; nothing changed.
    Skipped,
    /// The phase ran to completion and its result was recorded.
    Completed,
    /// The phase failed and its error was recorded.
    Failed(PhaseError),
    /// The phase finished after a reset or teardown and its result was dropped.
    Superseded,
}

impl PhaseOutcome {
    /// Returns `true` if the phase ran to completion.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns `true` if a guard rejected the call.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Returns the recorded error, if the phase failed.
    #[must_use]
    pub const fn error(&self) -> Option<&PhaseError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_fetch_names_every_resource() {
        let error = GachaKitError::AssetFetch {
            resources: vec!["pk".to_string(), "masterData".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Failed to fetch initial assets: pk, masterData"
        );
        assert_eq!(error.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_engine_messages_are_verbatim() {
        let error = GachaKitError::EngineLoad("WASM load failed".to_string());
        let phase_error = PhaseError::from(&error);
        assert_eq!(phase_error.message, "WASM load failed");
        assert_eq!(phase_error.kind, ErrorKind::Engine);
    }

    #[test]
    fn test_missing_prerequisite_is_a_precondition() {
        let error = GachaKitError::MissingPrerequisite(
            "Cannot verify: No proof or Merkle root available.".to_string(),
        );
        let phase_error = PhaseError::from(&error);
        assert_eq!(phase_error.kind, ErrorKind::Precondition);
        assert_eq!(
            phase_error.message,
            "Cannot verify: No proof or Merkle root available."
        );
    }

    #[test]
    fn test_error_kind_round_trips_through_strum() {
        assert_eq!(ErrorKind::Precondition.to_string(), "precondition");
        assert_eq!("validation".parse::<ErrorKind>(), Ok(ErrorKind::Validation));
    }
}
