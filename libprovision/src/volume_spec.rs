//! Normalized volume request parameters.
//!
//! A [`VolumeSpec`] is built from the raw key/value map a storage class (or
//! PVC annotations) supplies.  Normalization applies defaults but never drops
//! a parameter that conflicts with the volume's shape: extraneous keys are
//! kept so the conflict rules in [`crate::rules`] can report them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;

/// Canonical key for the backing filesystem name.
pub const PARAM_BACKEND_FS: &str = "volBackendFs";
/// Accepted alias for [`PARAM_BACKEND_FS`].
pub const PARAM_BACKEND_FS_ALIAS: &str = "backendFilesystem";
pub const PARAM_FILESET_TYPE: &str = "filesetType";
pub const PARAM_VOL_DIR_BASE_PATH: &str = "volDirBasePath";
pub const PARAM_PARENT_FILESET: &str = "parentFileset";
pub const PARAM_INODE_LIMIT: &str = "inodeLimit";
pub const PARAM_UID: &str = "uid";
pub const PARAM_GID: &str = "gid";
pub const PARAM_PERMISSIONS: &str = "permissions";
pub const PARAM_CLUSTER_ID: &str = "clusterId";
pub const PARAM_SHARED: &str = "shared";
pub const PARAM_VERSION: &str = "version";
pub const PARAM_ALLOW_VOLUME_EXPANSION: &str = "allowVolumeExpansion";

/// Kind of fileset backing a fileset-based volume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FilesetType {
    /// Own inode space and quota; supports inode limits and snapshots.
    Independent,
    /// Shares the parent's inode space.
    Dependent,
}

impl FilesetType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Independent => "independent",
            Self::Dependent => "dependent",
        }
    }
}

impl fmt::Display for FilesetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilesetType {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "independent" => Ok(Self::Independent),
            "dependent" => Ok(Self::Dependent),
            other => Err(NormalizeError::InvalidFilesetType(other.to_owned())),
        }
    }
}

/// Whether the volume is created by the driver or pre-exists.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Provisioning {
    #[default]
    Dynamic,
    Static,
}

/// Storage shape of a volume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VolumeKind {
    /// Plain directory under `volDirBasePath`.
    Lightweight,
    /// Independent fileset.
    Independent,
    /// Dependent fileset.
    Dependent,
}

impl fmt::Display for VolumeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lightweight => "lightweight volume",
            Self::Independent => "independent fileset",
            Self::Dependent => "dependent fileset",
        })
    }
}

/// The effective storage-class shape compared by the clone rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageShape<'a> {
    pub backend_filesystem: Option<&'a str>,
    pub kind: VolumeKind,
    pub vol_dir_base_path: Option<&'a str>,
    pub version: Option<&'a str>,
    pub cluster_id: Option<&'a str>,
}

/// One storage-class / volume-request parameter bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    #[serde(default)]
    pub backend_filesystem: Option<String>,
    #[serde(default)]
    pub fileset_type: Option<FilesetType>,
    #[serde(default)]
    pub vol_dir_base_path: Option<String>,
    #[serde(default)]
    pub parent_fileset: Option<String>,
    #[serde(default)]
    /// Signed so that negative limits reach the minimum-limit rule.
    pub inode_limit: Option<i64>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub gid: Option<String>,
    /// Raw permission bits; validated by the engine, see [`is_valid_permissions`].
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub allow_volume_expansion: bool,
    /// Not a storage-class parameter; never rendered by [`VolumeSpec::to_params`].
    #[serde(default)]
    pub provisioning: Provisioning,
    /// Requested or provisioned size.  Not a storage-class parameter.
    #[serde(default)]
    pub capacity_bytes: Option<u64>,
}

/// `true` if `value` is exactly three octal digits.
pub fn is_valid_permissions(value: &str) -> bool {
    value.len() == 3 && value.bytes().all(|b| (b'0'..=b'7').contains(&b))
}

fn lookup<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

fn parse_bool(params: &HashMap<String, String>, key: &str) -> Result<bool, NormalizeError> {
    match lookup(params, key) {
        None => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
        Some(v) => Err(NormalizeError::InvalidBool {
            key: key.to_owned(),
            value: v.to_owned(),
        }),
    }
}

impl VolumeSpec {
    /// Build a spec from raw storage-class parameters.
    ///
    /// Empty values count as absent and unknown keys are ignored.  A
    /// fileset-based request without `filesetType` defaults to
    /// [`FilesetType::Independent`]; a lightweight request keeps whatever it
    /// was given.
    pub fn normalize(params: &HashMap<String, String>) -> Result<Self, NormalizeError> {
        let permissions = lookup(params, PARAM_PERMISSIONS).map(str::to_owned);
        if let Some(p) = &permissions
            && !is_valid_permissions(p)
        {
            return Err(NormalizeError::InvalidPermissions(p.clone()));
        }

        let vol_dir_base_path = lookup(params, PARAM_VOL_DIR_BASE_PATH).map(str::to_owned);

        let mut fileset_type = lookup(params, PARAM_FILESET_TYPE)
            .map(FilesetType::from_str)
            .transpose()?;
        if fileset_type.is_none() && vol_dir_base_path.is_none() {
            fileset_type = Some(FilesetType::Independent);
        }

        let inode_limit = lookup(params, PARAM_INODE_LIMIT)
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|_| NormalizeError::InvalidInodeLimit(v.to_owned()))
            })
            .transpose()?;

        let backend_filesystem = lookup(params, PARAM_BACKEND_FS)
            .or_else(|| lookup(params, PARAM_BACKEND_FS_ALIAS))
            .map(str::to_owned);

        Ok(Self {
            backend_filesystem,
            fileset_type,
            vol_dir_base_path,
            parent_fileset: lookup(params, PARAM_PARENT_FILESET).map(str::to_owned),
            inode_limit,
            uid: lookup(params, PARAM_UID).map(str::to_owned),
            gid: lookup(params, PARAM_GID).map(str::to_owned),
            permissions,
            cluster_id: lookup(params, PARAM_CLUSTER_ID).map(str::to_owned),
            shared: parse_bool(params, PARAM_SHARED)?,
            version: lookup(params, PARAM_VERSION).map(str::to_owned),
            allow_volume_expansion: parse_bool(params, PARAM_ALLOW_VOLUME_EXPANSION)?,
            provisioning: Provisioning::Dynamic,
            capacity_bytes: None,
        })
    }

    /// Like [`VolumeSpec::normalize`], but keeps malformed `permissions`
    /// verbatim so the engine's rule order decides whether they are the
    /// reported problem.  Falls back to [`NormalizeError::InvalidPermissions`]
    /// when the remaining parameters do not parse either.
    pub fn normalize_deferred(params: &HashMap<String, String>) -> Result<Self, NormalizeError> {
        match Self::normalize(params) {
            Err(NormalizeError::InvalidPermissions(raw)) => {
                let mut rest = params.clone();
                rest.remove(PARAM_PERMISSIONS);
                match Self::normalize(&rest) {
                    Ok(mut spec) => {
                        spec.permissions = Some(raw);
                        Ok(spec)
                    }
                    Err(_) => Err(NormalizeError::InvalidPermissions(raw)),
                }
            }
            other => other,
        }
    }

    /// Render the canonical raw parameter map.
    pub fn to_params(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                params.insert(key.to_owned(), v);
            }
        };
        put(PARAM_BACKEND_FS, self.backend_filesystem.clone());
        put(
            PARAM_FILESET_TYPE,
            self.fileset_type.map(|t| t.as_str().to_owned()),
        );
        put(PARAM_VOL_DIR_BASE_PATH, self.vol_dir_base_path.clone());
        put(PARAM_PARENT_FILESET, self.parent_fileset.clone());
        put(PARAM_INODE_LIMIT, self.inode_limit.map(|n| n.to_string()));
        put(PARAM_UID, self.uid.clone());
        put(PARAM_GID, self.gid.clone());
        put(PARAM_PERMISSIONS, self.permissions.clone());
        put(PARAM_CLUSTER_ID, self.cluster_id.clone());
        put(PARAM_SHARED, self.shared.then(|| "true".to_owned()));
        put(PARAM_VERSION, self.version.clone());
        put(
            PARAM_ALLOW_VOLUME_EXPANSION,
            self.allow_volume_expansion.then(|| "true".to_owned()),
        );
        params
    }

    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.capacity_bytes = Some(bytes);
        self
    }

    pub fn with_provisioning(mut self, provisioning: Provisioning) -> Self {
        self.provisioning = provisioning;
        self
    }

    /// Lightweight if `volDirBasePath` is set, otherwise a fileset whose type
    /// defaults to independent.
    pub fn kind(&self) -> VolumeKind {
        if self.vol_dir_base_path.is_some() {
            return VolumeKind::Lightweight;
        }
        match self.fileset_type {
            Some(FilesetType::Dependent) => VolumeKind::Dependent,
            _ => VolumeKind::Independent,
        }
    }

    pub fn shape(&self) -> StorageShape<'_> {
        StorageShape {
            backend_filesystem: self.backend_filesystem.as_deref(),
            kind: self.kind(),
            vol_dir_base_path: self.vol_dir_base_path.as_deref(),
            version: self.version.as_deref(),
            cluster_id: self.cluster_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn fileset_based_defaults_to_independent() {
        let spec = VolumeSpec::normalize(&params(&[("volBackendFs", "gpfs0")])).unwrap();
        assert_eq!(spec.backend_filesystem.as_deref(), Some("gpfs0"));
        assert_eq!(spec.fileset_type, Some(FilesetType::Independent));
        assert_eq!(spec.kind(), VolumeKind::Independent);
        assert_eq!(spec.provisioning, Provisioning::Dynamic);
    }

    #[test]
    fn alias_key_is_accepted() {
        let spec = VolumeSpec::normalize(&params(&[("backendFilesystem", "gpfs0")])).unwrap();
        assert_eq!(spec.backend_filesystem.as_deref(), Some("gpfs0"));
        assert_eq!(spec.to_params().get(PARAM_BACKEND_FS).map(String::as_str), Some("gpfs0"));
    }

    #[test]
    fn lightweight_keeps_extraneous_keys() {
        let spec = VolumeSpec::normalize(&params(&[
            ("volBackendFs", "gpfs0"),
            ("volDirBasePath", "/data"),
            ("parentFileset", "pf1"),
            ("inodeLimit", "2048"),
        ]))
        .unwrap();
        assert_eq!(spec.kind(), VolumeKind::Lightweight);
        assert_eq!(spec.fileset_type, None);
        assert_eq!(spec.parent_fileset.as_deref(), Some("pf1"));
        assert_eq!(spec.inode_limit, Some(2048));
    }

    #[test]
    fn empty_values_are_absent() {
        let spec = VolumeSpec::normalize(&params(&[
            ("volBackendFs", "gpfs0"),
            ("permissions", ""),
            ("inodeLimit", ""),
            ("volDirBasePath", ""),
        ]))
        .unwrap();
        assert_eq!(spec.permissions, None);
        assert_eq!(spec.inode_limit, None);
        assert_eq!(spec.kind(), VolumeKind::Independent);
    }

    #[test]
    fn malformed_permissions_short_circuit() {
        for bad in ["778", "77", "7777", "rwx", "-77"] {
            let err = VolumeSpec::normalize(&params(&[("permissions", bad)])).unwrap_err();
            assert_eq!(err, NormalizeError::InvalidPermissions(bad.to_owned()));
        }
        // Reported even though other parameters are also unparsable.
        let err = VolumeSpec::normalize(&params(&[
            ("permissions", "999"),
            ("inodeLimit", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidPermissions(_)));
    }

    #[test]
    fn negative_inode_limit_is_kept() {
        let spec = VolumeSpec::normalize(&params(&[("volBackendFs", "gpfs0"), ("inodeLimit", "-1")]))
            .unwrap();
        assert_eq!(spec.inode_limit, Some(-1));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            VolumeSpec::normalize(&params(&[("inodeLimit", "1k")])),
            Err(NormalizeError::InvalidInodeLimit(_))
        ));
        assert!(matches!(
            VolumeSpec::normalize(&params(&[("filesetType", "shared")])),
            Err(NormalizeError::InvalidFilesetType(_))
        ));
        assert!(matches!(
            VolumeSpec::normalize(&params(&[("shared", "yes")])),
            Err(NormalizeError::InvalidBool { .. })
        ));
    }

    #[test]
    fn deferred_normalize_keeps_bad_permissions() {
        let spec =
            VolumeSpec::normalize_deferred(&params(&[("clusterId", "C1"), ("permissions", "888")]))
                .unwrap();
        assert_eq!(spec.permissions.as_deref(), Some("888"));
        assert_eq!(spec.cluster_id.as_deref(), Some("C1"));

        let err = VolumeSpec::normalize_deferred(&params(&[
            ("permissions", "888"),
            ("inodeLimit", "many"),
        ]))
        .unwrap_err();
        assert_eq!(err, NormalizeError::InvalidPermissions("888".to_owned()));
    }

    #[test]
    fn valid_permissions() {
        assert!(is_valid_permissions("777"));
        assert!(is_valid_permissions("000"));
        assert!(is_valid_permissions("750"));
        assert!(!is_valid_permissions("780"));
        assert!(!is_valid_permissions("0777"));
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = params(&[
            ("backendFilesystem", "gpfs0"),
            ("inodeLimit", "4096"),
            ("uid", "1000"),
            ("gid", "wheel"),
            ("permissions", "755"),
            ("clusterId", "C1"),
            ("shared", "True"),
            ("version", "2"),
            ("allowVolumeExpansion", "false"),
            ("csi.storage.k8s.io/fstype", "gpfs"),
        ]);
        let once = VolumeSpec::normalize(&raw).unwrap();
        let twice = VolumeSpec::normalize(&once.to_params()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn shape_ignores_ownership_and_size() {
        let a = VolumeSpec::normalize(&params(&[("volBackendFs", "fsA"), ("uid", "1")]))
            .unwrap()
            .with_capacity(1024);
        let b = VolumeSpec::normalize(&params(&[("volBackendFs", "fsA"), ("uid", "2")])).unwrap();
        assert_eq!(a.shape(), b.shape());

        let c = VolumeSpec::normalize(&params(&[("volBackendFs", "fsA"), ("version", "1")]))
            .unwrap();
        assert_ne!(a.shape(), c.shape());
    }
}
