//! CSI Controller service trait.
//!
//! The Controller service manages the centralized volume lifecycle.  This
//! crate does not provision anything itself; [`ValidatingController`] wraps
//! a backend implementation and gates creation on the validation engine.
//!
//! [`ValidatingController`]: crate::validating::ValidatingController

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{CreateSnapshotRequest, CreateVolumeRequest, Snapshot, Volume, VolumeId};

/// Controller service — centralized volume and snapshot management.
#[async_trait]
pub trait CsiController: Send + Sync {
    /// Provision a new volume, optionally pre-populated from a
    /// [`VolumeContentSource`](crate::types::VolumeContentSource).
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume, CsiError>;

    /// Delete a previously provisioned volume.
    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<(), CsiError>;

    /// List all volumes known to this controller.
    async fn list_volumes(&self) -> Result<Vec<Volume>, CsiError>;

    /// Take a snapshot of an existing volume.
    async fn create_snapshot(&self, req: CreateSnapshotRequest) -> Result<Snapshot, CsiError>;

    /// List all snapshots known to this controller.
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>, CsiError>;
}
