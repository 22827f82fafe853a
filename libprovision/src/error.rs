//! Error types.
//!
//! A rule violation is never an error: it is returned as a
//! [`Verdict::Deny`](crate::verdict::Verdict::Deny) value.  The enums in this
//! module cover the remaining failure paths:
//!
//! * [`NormalizeError`]: raw parameters that cannot be parsed at all.
//! * [`ValidationError`]: the engine could not reach a decision because an
//!   external oracle failed.
//! * [`EvaluateError`]: either of the above, from the raw-parameter entry
//!   point.
//! * [`CsiError`]: errors surfaced by the CSI controller adapter, each
//!   mapped to a gRPC-style [`Code`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::verdict::DenyReason;

/// Failure to turn raw storage-class parameters into a
/// [`VolumeSpec`](crate::volume_spec::VolumeSpec).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// `permissions` is not exactly three octal digits.
    #[error("invalid permissions {0:?}: expected three octal digits")]
    InvalidPermissions(String),

    /// `inodeLimit` is not an unsigned integer.
    #[error("invalid inodeLimit {0:?}: expected an integer")]
    InvalidInodeLimit(String),

    /// `filesetType` is neither `independent` nor `dependent`.
    #[error("invalid filesetType {0:?}: expected independent or dependent")]
    InvalidFilesetType(String),

    /// A boolean parameter holds something other than `true`/`false`.
    #[error("invalid value {value:?} for {key}: expected true or false")]
    InvalidBool {
        /// Raw parameter key.
        key: String,
        /// Offending value.
        value: String,
    },
}

/// The engine could not decide.
///
/// This is an infrastructure fault and deliberately distinct from a denial.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An oracle query failed.
    #[error("oracle unavailable during {query}: {reason}")]
    OracleUnavailable {
        /// The query that was in flight, e.g. `filesystem_is_known(gpfs0)`.
        query: String,
        /// Message reported by the oracle.
        reason: String,
    },
}

impl ValidationError {
    /// Stable reason string from the decision taxonomy.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::OracleUnavailable { .. } => "OracleUnavailable",
        }
    }
}

/// Failure of [`ValidationEngine::evaluate_params`](crate::engine::ValidationEngine::evaluate_params).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluateError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Subset of the gRPC status codes a CSI handler reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Code {
    /// Client specified an invalid argument.
    InvalidArgument = 3,
    /// Some requested entity was not found.
    NotFound = 5,
    /// Some entity that we attempted to create already exists.
    AlreadyExists = 6,
    /// Internal error.
    Internal = 13,
    /// The service is currently unavailable.
    Unavailable = 14,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Code::InvalidArgument => "InvalidArgument",
            Code::NotFound => "NotFound",
            Code::AlreadyExists => "AlreadyExists",
            Code::Internal => "Internal",
            Code::Unavailable => "Unavailable",
        })
    }
}

/// Unified error type for CSI controller operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum CsiError {
    /// The validation engine denied the request.
    #[error("invalid argument: {reason}: {detail}")]
    Rejected {
        /// Stable taxonomy entry.
        reason: DenyReason,
        /// Human-readable explanation.
        detail: String,
    },

    /// The requested volume was not found.
    #[error("volume {0} not found")]
    VolumeNotFound(String),

    /// The requested snapshot was not found.
    #[error("snapshot {0} not found")]
    SnapshotNotFound(String),

    /// A volume or snapshot with this name already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The caller supplied parameters that could not be parsed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A dependency needed to reach a decision is unavailable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CsiError {
    /// Status code a gRPC handler should report for this error.
    pub fn code(&self) -> Code {
        match self {
            Self::Rejected { .. } | Self::InvalidArgument(_) => Code::InvalidArgument,
            Self::VolumeNotFound(_) | Self::SnapshotNotFound(_) => Code::NotFound,
            Self::AlreadyExists(_) => Code::AlreadyExists,
            Self::Unavailable(_) => Code::Unavailable,
            Self::Internal(_) => Code::Internal,
        }
    }

    /// Create a [`CsiError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<NormalizeError> for CsiError {
    fn from(e: NormalizeError) -> Self {
        match e {
            NormalizeError::InvalidPermissions(value) => Self::Rejected {
                reason: DenyReason::InvalidPermissions,
                detail: format!("invalid permissions {value:?}"),
            },
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}

impl From<ValidationError> for CsiError {
    fn from(e: ValidationError) -> Self {
        Self::Unavailable(format!("{}: {e}", e.reason()))
    }
}
