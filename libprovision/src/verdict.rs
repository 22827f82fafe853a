//! Decision outcome and the closed reason taxonomy.
//!
//! Downstream consumers string-match reason names, so the text returned by
//! [`DenyReason::as_str`] (and the serde representation, which is identical)
//! must never change.  `OracleUnavailable` is part of the same taxonomy but is
//! reported through [`ValidationError`](crate::error::ValidationError) rather
//! than as a denial.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DenyReason {
    MissingBackendFilesystem,
    InvalidPermissions,
    ParentFilesetRequiresDependent,
    FilesetTypeWithLightweightConflict,
    ParentFilesetWithLightweightConflict,
    InodeLimitWithLightweightConflict,
    InodeLimitWithDependentConflict,
    InodeLimitTooSmall,
    PrincipalNotFound,
    FilesystemUnknown,
    BasePathNotPresent,
    CloneRequiresDistinctStorageClass,
    CloneSizeTooSmall,
    SnapshotRequiresIndependentSource,
}

impl DenyReason {
    /// Stable reason string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingBackendFilesystem => "MissingBackendFilesystem",
            Self::InvalidPermissions => "InvalidPermissions",
            Self::ParentFilesetRequiresDependent => "ParentFilesetRequiresDependent",
            Self::FilesetTypeWithLightweightConflict => "FilesetTypeWithLightweightConflict",
            Self::ParentFilesetWithLightweightConflict => "ParentFilesetWithLightweightConflict",
            Self::InodeLimitWithLightweightConflict => "InodeLimitWithLightweightConflict",
            Self::InodeLimitWithDependentConflict => "InodeLimitWithDependentConflict",
            Self::InodeLimitTooSmall => "InodeLimitTooSmall",
            Self::PrincipalNotFound => "PrincipalNotFound",
            Self::FilesystemUnknown => "FilesystemUnknown",
            Self::BasePathNotPresent => "BasePathNotPresent",
            Self::CloneRequiresDistinctStorageClass => "CloneRequiresDistinctStorageClass",
            Self::CloneSizeTooSmall => "CloneSizeTooSmall",
            Self::SnapshotRequiresIndependentSource => "SnapshotRequiresIndependentSource",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "UPPERCASE")]
pub enum Verdict {
    /// The request is well formed.
    Allow,
    /// The request is rejected.
    Deny {
        /// Stable taxonomy entry; match on this.
        reason: DenyReason,
        /// Human-readable explanation.  Not part of the stable contract.
        detail: String,
    },
}

impl Verdict {
    pub(crate) fn deny(reason: DenyReason, detail: impl Into<String>) -> Self {
        Self::Deny {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// The denial reason, or `None` for [`Verdict::Allow`].
    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny { reason, .. } => Some(*reason),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("ALLOW"),
            Self::Deny { reason, detail } => write!(f, "DENY {reason} ({detail})"),
        }
    }
}
