//! # libprovision — volume provisioning decision engine
//!
//! `libprovision` decides whether a fileset-backed volume request is well
//! formed before a CSI driver touches the clustered filesystem.  A request is
//! one of an independent fileset, a dependent fileset or a lightweight
//! directory volume, plus optional ownership, inode limit and permission
//! settings.  Clone and snapshot-restore requests are additionally checked
//! against their source volume.
//!
//! Every decision is a [`Verdict`]: `ALLOW`, or `DENY` with a reason from a
//! closed, stable taxonomy ([`DenyReason`]).  An oracle outage is reported
//! separately as [`ValidationError::OracleUnavailable`].
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`volume_spec`] | [`VolumeSpec`] and raw-parameter normalization. |
//! | [`rules`] | Ordered single-spec and transition rule tables. |
//! | [`engine`] | [`ValidationEngine`] — evaluates specs against the rules. |
//! | [`verdict`] | [`Verdict`] and the [`DenyReason`] taxonomy. |
//! | [`oracle`] | [`Oracle`] trait for principal / filesystem / path lookups. |
//! | [`config`] | [`ValidationConfig`] from defaults, YAML and environment. |
//! | [`error`] | Error enums and the CSI status [`Code`] mapping. |
//! | [`types`] | CSI controller data model: volumes, snapshots, requests. |
//! | [`controller`] | [`CsiController`] trait. |
//! | [`validating`] | [`ValidatingController`] — gates a backend on the engine. |

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod rules;
pub mod types;
pub mod validating;
pub mod verdict;
pub mod volume_spec;

// Re-export the most commonly used items at crate root for convenience.
pub use config::{VALIDATION_CONFIG, ValidationConfig};
pub use controller::CsiController;
pub use engine::{Operation, ValidationEngine};
pub use error::{Code, CsiError, EvaluateError, NormalizeError, ValidationError};
pub use oracle::{Oracle, OracleError, PrincipalKind, StaticOracle};
pub use types::*;
pub use validating::ValidatingController;
pub use verdict::{DenyReason, Verdict};
pub use volume_spec::{FilesetType, Provisioning, VolumeKind, VolumeSpec};
