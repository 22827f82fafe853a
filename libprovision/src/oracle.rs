//! Existence lookups the engine delegates to its environment.
//!
//! The production implementation talks to the clustered filesystem's
//! management API and is not part of this crate.  [`StaticOracle`] answers
//! from an in-memory inventory and suits static setups and tests.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

/// Whether a principal lookup targets a user or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    User,
    Group,
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Group => "group",
        })
    }
}

/// The oracle could not answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct OracleError(pub String);

impl OracleError {
    pub fn new<E: fmt::Display>(e: E) -> Self {
        Self(e.to_string())
    }
}

/// Existence queries against the storage cluster.
///
/// Implementations may block on network I/O; the engine applies no timeout
/// or retry of its own.
pub trait Oracle: Send + Sync {
    /// Does the user or group named (or numbered) `id_or_name` exist?
    fn principal_exists(&self, id_or_name: &str, kind: PrincipalKind)
    -> Result<bool, OracleError>;

    /// Is `name` a known, mounted filesystem?
    fn filesystem_is_known(&self, name: &str) -> Result<bool, OracleError>;

    /// Does `path` exist inside filesystem `fs_name`?
    fn path_exists_under_filesystem(&self, fs_name: &str, path: &str)
    -> Result<bool, OracleError>;
}

/// In-memory inventory of principals, filesystems and directories.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    users: HashSet<String>,
    groups: HashSet<String>,
    filesystems: HashMap<String, HashSet<String>>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id_or_name: impl Into<String>) -> Self {
        self.users.insert(id_or_name.into());
        self
    }

    pub fn with_group(mut self, id_or_name: impl Into<String>) -> Self {
        self.groups.insert(id_or_name.into());
        self
    }

    pub fn with_filesystem(mut self, name: impl Into<String>) -> Self {
        self.filesystems.entry(name.into()).or_default();
        self
    }

    /// Register `path` under `fs_name`, registering the filesystem too.
    pub fn with_path(mut self, fs_name: impl Into<String>, path: impl Into<String>) -> Self {
        self.filesystems
            .entry(fs_name.into())
            .or_default()
            .insert(path.into());
        self
    }
}

impl Oracle for StaticOracle {
    fn principal_exists(
        &self,
        id_or_name: &str,
        kind: PrincipalKind,
    ) -> Result<bool, OracleError> {
        let set = match kind {
            PrincipalKind::User => &self.users,
            PrincipalKind::Group => &self.groups,
        };
        Ok(set.contains(id_or_name))
    }

    fn filesystem_is_known(&self, name: &str) -> Result<bool, OracleError> {
        Ok(self.filesystems.contains_key(name))
    }

    fn path_exists_under_filesystem(
        &self,
        fs_name: &str,
        path: &str,
    ) -> Result<bool, OracleError> {
        let path = path.trim_end_matches('/');
        Ok(self
            .filesystems
            .get(fs_name)
            .is_some_and(|paths| paths.iter().any(|p| p.trim_end_matches('/') == path)))
    }
}
