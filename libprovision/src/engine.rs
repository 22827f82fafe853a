//! The validation engine.
//!
//! [`ValidationEngine`] walks the rule tables from [`crate::rules`] and turns
//! the first violation into a [`Verdict::Deny`].  It holds no mutable state,
//! so one instance can serve any number of concurrent callers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{VALIDATION_CONFIG, ValidationConfig};
use crate::error::{EvaluateError, NormalizeError, ValidationError};
use crate::oracle::Oracle;
use crate::rules::{RuleContext, SINGLE_RULES, SingleRule, TRANSITION_RULES, TransitionRule};
use crate::verdict::{DenyReason, Verdict};
use crate::volume_spec::{PARAM_BACKEND_FS, PARAM_BACKEND_FS_ALIAS, VolumeSpec};

/// Operation that creates a volume from existing data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Operation {
    /// PVC → PVC.
    Clone,
    /// PVC → snapshot → PVC.
    SnapshotRestore,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Clone => "clone",
            Self::SnapshotRestore => "snapshot-restore",
        })
    }
}

/// Progress of a clone or restore decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Requested,
    ValidatingTarget,
    ValidatingTransition,
    Allowed,
    Denied,
}

impl fmt::Display for TransitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requested => "Requested",
            Self::ValidatingTarget => "ValidatingTarget",
            Self::ValidatingTransition => "ValidatingTransition",
            Self::Allowed => "Allowed",
            Self::Denied => "Denied",
        })
    }
}

/// Stateless decision engine over the compiled rule tables.
pub struct ValidationEngine {
    config: ValidationConfig,
    single_rules: &'static [SingleRule],
    transition_rules: &'static [TransitionRule],
}

impl Default for ValidationEngine {
    /// Engine configured from the process environment.
    fn default() -> Self {
        Self::new(VALIDATION_CONFIG.clone())
    }
}

impl fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("config", &self.config)
            .field("single_rules", &self.single_rules.len())
            .field("transition_rules", &self.transition_rules.len())
            .finish()
    }
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            single_rules: &SINGLE_RULES,
            transition_rules: &TRANSITION_RULES,
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Decide whether one volume request is well formed.
    ///
    /// Oracle-backed rules run only when `oracle` is supplied.  An oracle
    /// failure aborts the evaluation with
    /// [`ValidationError::OracleUnavailable`].
    #[instrument(skip_all, fields(kind = ?spec.kind()))]
    pub fn evaluate_single(
        &self,
        spec: &VolumeSpec,
        oracle: Option<&dyn Oracle>,
    ) -> Result<Verdict, ValidationError> {
        let ctx = RuleContext::new(&self.config, oracle);
        for rule in self.single_rules {
            if let Some(detail) = rule.check(spec, &ctx)? {
                debug!(rule = rule.name, reason = %rule.reason, %detail, "rule violated");
                return Ok(Verdict::deny(rule.reason, detail));
            }
        }
        debug!("all rules passed");
        Ok(Verdict::Allow)
    }

    /// Decide whether `target` may be provisioned from `source`.
    ///
    /// The target is validated on its own first and a denial there is
    /// returned unchanged; the transition rules for `operation` run only for
    /// a valid target.
    #[instrument(skip_all, fields(%operation))]
    pub fn evaluate_transition(
        &self,
        source: &VolumeSpec,
        target: &VolumeSpec,
        operation: Operation,
        oracle: Option<&dyn Oracle>,
    ) -> Result<Verdict, ValidationError> {
        let mut state = TransitionState::Requested;
        let mut verdict = Verdict::Allow;
        loop {
            debug!(%state, "transition step");
            state = match state {
                TransitionState::Requested => TransitionState::ValidatingTarget,
                TransitionState::ValidatingTarget => {
                    verdict = self.evaluate_single(target, oracle)?;
                    if verdict.is_allowed() {
                        TransitionState::ValidatingTransition
                    } else {
                        TransitionState::Denied
                    }
                }
                TransitionState::ValidatingTransition => {
                    verdict = self.check_transition(source, target, operation);
                    if verdict.is_allowed() {
                        TransitionState::Allowed
                    } else {
                        TransitionState::Denied
                    }
                }
                TransitionState::Allowed | TransitionState::Denied => return Ok(verdict),
            };
        }
    }

    fn check_transition(
        &self,
        source: &VolumeSpec,
        target: &VolumeSpec,
        operation: Operation,
    ) -> Verdict {
        let applicable = self
            .transition_rules
            .iter()
            .filter(|rule| rule.operation == operation);
        for rule in applicable {
            if let Some(detail) = rule.check(source, target) {
                debug!(rule = rule.name, reason = %rule.reason, %detail, "transition rule violated");
                return Verdict::deny(rule.reason, detail);
            }
        }
        Verdict::Allow
    }

    /// Normalize raw parameters and evaluate the result.
    ///
    /// Malformed `permissions` surface as a
    /// [`DenyReason::InvalidPermissions`] verdict, ranked by the rule order
    /// like any other violation.  Other parse failures are errors.
    pub fn evaluate_params(
        &self,
        params: &HashMap<String, String>,
        oracle: Option<&dyn Oracle>,
    ) -> Result<Verdict, EvaluateError> {
        let spec = match VolumeSpec::normalize_deferred(params) {
            Ok(spec) => spec,
            Err(NormalizeError::InvalidPermissions(raw)) => {
                let has_backend = [PARAM_BACKEND_FS, PARAM_BACKEND_FS_ALIAS]
                    .iter()
                    .any(|key| params.get(*key).is_some_and(|v| !v.is_empty()));
                let verdict = if has_backend {
                    Verdict::deny(
                        DenyReason::InvalidPermissions,
                        format!("invalid value specified for permissions: {raw:?}"),
                    )
                } else {
                    Verdict::deny(
                        DenyReason::MissingBackendFilesystem,
                        "volBackendFs must be specified in storage class",
                    )
                };
                return Ok(verdict);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(self.evaluate_single(&spec, oracle)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleError, PrincipalKind, StaticOracle};
    use crate::volume_spec::{FilesetType, Provisioning};

    struct DownOracle;

    impl Oracle for DownOracle {
        fn principal_exists(&self, _: &str, _: PrincipalKind) -> Result<bool, OracleError> {
            Err(OracleError::new("connection refused"))
        }

        fn filesystem_is_known(&self, _: &str) -> Result<bool, OracleError> {
            Err(OracleError::new("connection refused"))
        }

        fn path_exists_under_filesystem(&self, _: &str, _: &str) -> Result<bool, OracleError> {
            Err(OracleError::new("connection refused"))
        }
    }

    fn engine() -> ValidationEngine {
        ValidationEngine::new(ValidationConfig::default())
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn independent(fs: &str) -> VolumeSpec {
        VolumeSpec {
            backend_filesystem: Some(fs.into()),
            fileset_type: Some(FilesetType::Independent),
            ..Default::default()
        }
    }

    #[test]
    fn allows_plain_independent_fileset() {
        let verdict = engine().evaluate_single(&independent("gpfs0"), None).unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn missing_filesystem_outranks_parent_fileset() {
        let spec = VolumeSpec {
            parent_fileset: Some("pf1".into()),
            ..Default::default()
        };
        let verdict = engine().evaluate_single(&spec, None).unwrap();
        assert_eq!(verdict.reason(), Some(DenyReason::MissingBackendFilesystem));
    }

    #[test]
    fn static_volume_without_filesystem_is_allowed() {
        let spec = VolumeSpec::default().with_provisioning(Provisioning::Static);
        assert!(engine().evaluate_single(&spec, None).unwrap().is_allowed());
    }

    #[test]
    fn oracle_rules() {
        let oracle = StaticOracle::new()
            .with_user("1000")
            .with_group("100")
            .with_path("gpfs0", "/data");
        let engine = engine();

        let spec = VolumeSpec {
            uid: Some("1000".into()),
            gid: Some("100".into()),
            ..independent("gpfs0")
        };
        assert!(engine.evaluate_single(&spec, Some(&oracle)).unwrap().is_allowed());

        let spec = VolumeSpec {
            gid: Some("999".into()),
            ..independent("gpfs0")
        };
        let verdict = engine.evaluate_single(&spec, Some(&oracle)).unwrap();
        assert_eq!(verdict.reason(), Some(DenyReason::PrincipalNotFound));

        let verdict = engine
            .evaluate_single(&independent("gpfs9"), Some(&oracle))
            .unwrap();
        assert_eq!(verdict.reason(), Some(DenyReason::FilesystemUnknown));

        let spec = VolumeSpec {
            backend_filesystem: Some("gpfs0".into()),
            vol_dir_base_path: Some("/invalid".into()),
            ..Default::default()
        };
        let verdict = engine.evaluate_single(&spec, Some(&oracle)).unwrap();
        assert_eq!(verdict.reason(), Some(DenyReason::BasePathNotPresent));
    }

    #[test]
    fn oracle_failure_is_not_a_denial() {
        let err = engine()
            .evaluate_single(&independent("gpfs0"), Some(&DownOracle))
            .unwrap_err();
        assert_eq!(err.reason(), "OracleUnavailable");
        assert!(matches!(err, ValidationError::OracleUnavailable { ref query, .. }
            if query == "filesystem_is_known(gpfs0)"));
    }

    #[test]
    fn static_rules_run_before_the_oracle() {
        let spec = VolumeSpec {
            inode_limit: Some(10),
            ..independent("gpfs0")
        };
        let verdict = engine().evaluate_single(&spec, Some(&DownOracle)).unwrap();
        assert_eq!(verdict.reason(), Some(DenyReason::InodeLimitTooSmall));
    }

    #[test]
    fn transition_propagates_target_denial() {
        let source = independent("fsA");
        let target = VolumeSpec {
            inode_limit: Some(100),
            ..independent("fsB")
        };
        for operation in [Operation::Clone, Operation::SnapshotRestore] {
            let verdict = engine()
                .evaluate_transition(&source, &target, operation, None)
                .unwrap();
            assert_eq!(verdict.reason(), Some(DenyReason::InodeLimitTooSmall));
        }
    }

    #[test]
    fn clone_rules_in_order() {
        let engine = engine();
        let source = independent("fsA").with_capacity(2048);

        let same = independent("fsA").with_capacity(1024);
        let verdict = engine
            .evaluate_transition(&source, &same, Operation::Clone, None)
            .unwrap();
        assert_eq!(
            verdict.reason(),
            Some(DenyReason::CloneRequiresDistinctStorageClass)
        );

        let smaller = independent("fsB").with_capacity(1024);
        let verdict = engine
            .evaluate_transition(&source, &smaller, Operation::Clone, None)
            .unwrap();
        assert_eq!(verdict.reason(), Some(DenyReason::CloneSizeTooSmall));

        let ok = independent("fsB").with_capacity(4096);
        assert!(engine
            .evaluate_transition(&source, &ok, Operation::Clone, None)
            .unwrap()
            .is_allowed());
    }

    #[test]
    fn restore_ignores_clone_rules() {
        let source = independent("fsA").with_capacity(2048);
        let target = independent("fsA").with_capacity(1024);
        let verdict = engine()
            .evaluate_transition(&source, &target, Operation::SnapshotRestore, None)
            .unwrap();
        assert!(verdict.is_allowed());
    }

    #[test]
    fn params_entry_point_ranks_bad_permissions() {
        let engine = engine();

        let verdict = engine
            .evaluate_params(&params(&[("clusterId", "C1"), ("permissions", "900")]), None)
            .unwrap();
        assert_eq!(verdict.reason(), Some(DenyReason::MissingBackendFilesystem));

        let verdict = engine
            .evaluate_params(
                &params(&[("volBackendFs", "gpfs0"), ("permissions", "900"), ("parentFileset", "p")]),
                None,
            )
            .unwrap();
        assert_eq!(verdict.reason(), Some(DenyReason::InvalidPermissions));

        let err = engine
            .evaluate_params(&params(&[("inodeLimit", "x")]), None)
            .unwrap_err();
        assert!(matches!(err, EvaluateError::Normalize(NormalizeError::InvalidInodeLimit(_))));
    }

    #[test]
    fn missing_backend_outranks_permissions_when_nothing_parses() {
        let engine = engine();

        let verdict = engine
            .evaluate_params(&params(&[("permissions", "900"), ("inodeLimit", "x")]), None)
            .unwrap();
        assert_eq!(verdict.reason(), Some(DenyReason::MissingBackendFilesystem));

        let verdict = engine
            .evaluate_params(
                &params(&[("backendFilesystem", "gpfs0"), ("permissions", "900"), ("inodeLimit", "x")]),
                None,
            )
            .unwrap();
        assert_eq!(verdict.reason(), Some(DenyReason::InvalidPermissions));
    }

    #[test]
    fn oracle_lookups_can_be_disabled() {
        let engine = ValidationEngine::new(ValidationConfig {
            oracle_lookups: false,
            ..Default::default()
        });
        let verdict = engine
            .evaluate_single(&independent("gpfs0"), Some(&DownOracle))
            .unwrap();
        assert!(verdict.is_allowed());
    }
}
