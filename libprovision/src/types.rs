//! CSI controller data model: volumes, snapshots and creation requests.
//!
//! All types are [`Serialize`]/[`Deserialize`] so they can be persisted or
//! forwarded as JSON by the embedding driver.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Opaque, unique identifier for a volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VolumeId(pub String);

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque, unique identifier for a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SnapshotId(pub String);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SnapshotId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Volumes & snapshots
// ---------------------------------------------------------------------------

/// Where the initial content of a new volume comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum VolumeContentSource {
    /// Clone an existing volume.
    Volume(VolumeId),
    /// Restore from a snapshot.
    Snapshot(SnapshotId),
}

/// Metadata for a provisioned volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    pub volume_id: VolumeId,
    /// Provisioned capacity in bytes.
    pub capacity_bytes: u64,
    /// Storage-class parameters the volume was created with.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// Opaque context passed from Controller to Node operations.
    #[serde(default)]
    pub volume_context: HashMap<String, String>,
    #[serde(default)]
    pub content_source: Option<VolumeContentSource>,
}

/// Point-in-time copy of a volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub snapshot_id: SnapshotId,
    pub source_volume_id: VolumeId,
    /// Size of the source volume when the snapshot was taken.
    pub size_bytes: u64,
    #[serde(default)]
    pub ready_to_use: bool,
    /// Storage-class parameters of the source volume at snapshot time.
    /// Restores are checked against these, so they outlive the source.
    #[serde(default)]
    pub source_parameters: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request to create a new volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    /// Human-readable name for the volume.
    pub name: String,
    /// Desired capacity in bytes.
    pub capacity_bytes: u64,
    /// Storage-class parameters.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub content_source: Option<VolumeContentSource>,
}

/// Request to snapshot an existing volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    pub name: String,
    pub source_volume_id: VolumeId,
    /// Filled in from the source volume before the backend sees the request;
    /// backends persist it as [`Snapshot::source_parameters`].
    #[serde(default)]
    pub source_parameters: HashMap<String, String>,
}

impl CreateSnapshotRequest {
    pub fn new(name: impl Into<String>, source_volume_id: impl Into<VolumeId>) -> Self {
        Self {
            name: name.into(),
            source_volume_id: source_volume_id.into(),
            source_parameters: HashMap::new(),
        }
    }
}
