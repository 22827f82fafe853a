//! The compiled rule tables.
//!
//! Rules are evaluated in slice order and the first violation decides the
//! denial reason.  Several triggers overlap (a request with no backend
//! filesystem *and* a parent fileset must report the missing filesystem), so
//! reordering either table changes observable behaviour.

use crate::config::ValidationConfig;
use crate::engine::Operation;
use crate::error::ValidationError;
use crate::oracle::{Oracle, OracleError, PrincipalKind};
use crate::verdict::DenyReason;
use crate::volume_spec::{
    FilesetType, Provisioning, VolumeKind, VolumeSpec, is_valid_permissions,
};

/// `Ok(Some(detail))` when the rule is violated.
pub type RuleOutcome = Result<Option<String>, ValidationError>;

/// Inputs available to a single-spec rule besides the spec itself.
pub struct RuleContext<'a> {
    config: &'a ValidationConfig,
    oracle: Option<&'a dyn Oracle>,
}

impl<'a> RuleContext<'a> {
    pub fn new(config: &'a ValidationConfig, oracle: Option<&'a dyn Oracle>) -> Self {
        Self { config, oracle }
    }

    /// The oracle, if one was supplied and lookups are enabled.
    fn oracle(&self) -> Option<&'a dyn Oracle> {
        self.oracle.filter(|_| self.config.oracle_lookups)
    }
}

/// A named constraint over one [`VolumeSpec`].
pub struct SingleRule {
    pub name: &'static str,
    pub reason: DenyReason,
    check: fn(&VolumeSpec, &RuleContext<'_>) -> RuleOutcome,
}

impl SingleRule {
    pub fn check(&self, spec: &VolumeSpec, ctx: &RuleContext<'_>) -> RuleOutcome {
        (self.check)(spec, ctx)
    }
}

/// A named constraint over a source/target pair for one operation.
pub struct TransitionRule {
    pub name: &'static str,
    pub reason: DenyReason,
    pub operation: Operation,
    check: fn(&VolumeSpec, &VolumeSpec) -> Option<String>,
}

impl TransitionRule {
    pub fn check(&self, source: &VolumeSpec, target: &VolumeSpec) -> Option<String> {
        (self.check)(source, target)
    }
}

pub static SINGLE_RULES: [SingleRule; 11] = [
    SingleRule {
        name: "backend-filesystem-required",
        reason: DenyReason::MissingBackendFilesystem,
        check: missing_backend_filesystem,
    },
    SingleRule {
        name: "permissions-octal",
        reason: DenyReason::InvalidPermissions,
        check: invalid_permissions,
    },
    SingleRule {
        name: "parent-fileset-requires-dependent",
        reason: DenyReason::ParentFilesetRequiresDependent,
        check: parent_fileset_requires_dependent,
    },
    SingleRule {
        name: "lightweight-excludes-fileset-type",
        reason: DenyReason::FilesetTypeWithLightweightConflict,
        check: fileset_type_with_lightweight,
    },
    SingleRule {
        name: "lightweight-excludes-parent-fileset",
        reason: DenyReason::ParentFilesetWithLightweightConflict,
        check: parent_fileset_with_lightweight,
    },
    SingleRule {
        name: "lightweight-excludes-inode-limit",
        reason: DenyReason::InodeLimitWithLightweightConflict,
        check: inode_limit_with_lightweight,
    },
    SingleRule {
        name: "dependent-excludes-inode-limit",
        reason: DenyReason::InodeLimitWithDependentConflict,
        check: inode_limit_with_dependent,
    },
    SingleRule {
        name: "inode-limit-minimum",
        reason: DenyReason::InodeLimitTooSmall,
        check: inode_limit_too_small,
    },
    SingleRule {
        name: "principal-exists",
        reason: DenyReason::PrincipalNotFound,
        check: principal_not_found,
    },
    SingleRule {
        name: "filesystem-known",
        reason: DenyReason::FilesystemUnknown,
        check: filesystem_unknown,
    },
    SingleRule {
        name: "base-path-present",
        reason: DenyReason::BasePathNotPresent,
        check: base_path_not_present,
    },
];

pub static TRANSITION_RULES: [TransitionRule; 3] = [
    TransitionRule {
        name: "clone-distinct-storage-class",
        reason: DenyReason::CloneRequiresDistinctStorageClass,
        operation: Operation::Clone,
        check: clone_same_storage_class,
    },
    TransitionRule {
        name: "clone-size",
        reason: DenyReason::CloneSizeTooSmall,
        operation: Operation::Clone,
        check: clone_size_too_small,
    },
    TransitionRule {
        name: "snapshot-independent-source",
        reason: DenyReason::SnapshotRequiresIndependentSource,
        operation: Operation::SnapshotRestore,
        check: snapshot_source_not_independent,
    },
];

fn ask(
    result: Result<bool, OracleError>,
    query: impl FnOnce() -> String,
) -> Result<bool, ValidationError> {
    result.map_err(|e| ValidationError::OracleUnavailable {
        query: query(),
        reason: e.0,
    })
}

fn missing_backend_filesystem(spec: &VolumeSpec, _: &RuleContext<'_>) -> RuleOutcome {
    let missing = spec.backend_filesystem.as_deref().is_none_or(str::is_empty);
    Ok((spec.provisioning == Provisioning::Dynamic && missing)
        .then(|| "volBackendFs must be specified in storage class".to_owned()))
}

fn invalid_permissions(spec: &VolumeSpec, _: &RuleContext<'_>) -> RuleOutcome {
    Ok(spec
        .permissions
        .as_deref()
        .filter(|p| !is_valid_permissions(p))
        .map(|p| format!("invalid value specified for permissions: {p:?}")))
}

fn parent_fileset_requires_dependent(spec: &VolumeSpec, _: &RuleContext<'_>) -> RuleOutcome {
    let dependent = spec.fileset_type == Some(FilesetType::Dependent);
    Ok((spec.parent_fileset.is_some() && !dependent).then(|| {
        "parentFileset and filesetType=independent(Default) are mutually exclusive".to_owned()
    }))
}

fn fileset_type_with_lightweight(spec: &VolumeSpec, _: &RuleContext<'_>) -> RuleOutcome {
    Ok((spec.vol_dir_base_path.is_some() && spec.fileset_type.is_some())
        .then(|| "filesetType and volDirBasePath are mutually exclusive".to_owned()))
}

fn parent_fileset_with_lightweight(spec: &VolumeSpec, _: &RuleContext<'_>) -> RuleOutcome {
    Ok((spec.vol_dir_base_path.is_some() && spec.parent_fileset.is_some())
        .then(|| "parentFileset and volDirBasePath are mutually exclusive".to_owned()))
}

fn inode_limit_with_lightweight(spec: &VolumeSpec, _: &RuleContext<'_>) -> RuleOutcome {
    Ok((spec.vol_dir_base_path.is_some() && spec.inode_limit.is_some())
        .then(|| "inodeLimit and volDirBasePath are mutually exclusive".to_owned()))
}

fn inode_limit_with_dependent(spec: &VolumeSpec, _: &RuleContext<'_>) -> RuleOutcome {
    let dependent = spec.fileset_type == Some(FilesetType::Dependent);
    Ok((spec.inode_limit.is_some() && dependent)
        .then(|| "inodeLimit and filesetType=dependent are mutually exclusive".to_owned()))
}

fn inode_limit_too_small(spec: &VolumeSpec, ctx: &RuleContext<'_>) -> RuleOutcome {
    let min = ctx.config.min_inode_limit;
    Ok(spec
        .inode_limit
        .filter(|n| u64::try_from(*n).map_or(true, |n| n < min))
        .map(|n| format!("inodeLimit {n} is below the minimum {min}")))
}

fn principal_not_found(spec: &VolumeSpec, ctx: &RuleContext<'_>) -> RuleOutcome {
    let Some(oracle) = ctx.oracle() else {
        return Ok(None);
    };
    let principals = [
        (spec.uid.as_deref(), PrincipalKind::User),
        (spec.gid.as_deref(), PrincipalKind::Group),
    ];
    for (id, kind) in principals {
        let Some(id) = id else { continue };
        let exists = ask(oracle.principal_exists(id, kind), || {
            format!("principal_exists({id}, {kind})")
        })?;
        if !exists {
            return Ok(Some(format!("{kind} {id} not found")));
        }
    }
    Ok(None)
}

fn filesystem_unknown(spec: &VolumeSpec, ctx: &RuleContext<'_>) -> RuleOutcome {
    let (Some(oracle), Some(fs)) = (ctx.oracle(), spec.backend_filesystem.as_deref()) else {
        return Ok(None);
    };
    let known = ask(oracle.filesystem_is_known(fs), || {
        format!("filesystem_is_known({fs})")
    })?;
    Ok((!known).then(|| format!("filesystem {fs} is not known or not mounted")))
}

fn base_path_not_present(spec: &VolumeSpec, ctx: &RuleContext<'_>) -> RuleOutcome {
    let (Some(oracle), Some(fs), Some(path)) = (
        ctx.oracle(),
        spec.backend_filesystem.as_deref(),
        spec.vol_dir_base_path.as_deref(),
    ) else {
        return Ok(None);
    };
    let present = ask(oracle.path_exists_under_filesystem(fs, path), || {
        format!("path_exists_under_filesystem({fs}, {path})")
    })?;
    Ok((!present).then(|| format!("directory base path {path} not present in filesystem {fs}")))
}

fn clone_same_storage_class(source: &VolumeSpec, target: &VolumeSpec) -> Option<String> {
    (source.shape() == target.shape()).then(|| {
        "clone target must use a storage class different from the source volume".to_owned()
    })
}

fn clone_size_too_small(source: &VolumeSpec, target: &VolumeSpec) -> Option<String> {
    match (source.capacity_bytes, target.capacity_bytes) {
        (Some(src), Some(dst)) if dst < src => Some(format!(
            "requested size {dst} is smaller than source volume size {src}"
        )),
        _ => None,
    }
}

fn snapshot_source_not_independent(source: &VolumeSpec, _: &VolumeSpec) -> Option<String> {
    let kind = source.kind();
    (kind != VolumeKind::Independent).then(|| {
        format!("snapshots can only be taken from an independent fileset, source is a {kind}")
    })
}
