//! Controller adapter that validates requests before provisioning.
//!
//! [`ValidatingController`] sits in front of any [`CsiController`] and runs
//! the [`ValidationEngine`] on every `create_volume`.  A denied request never
//! reaches the backend; it comes back as [`CsiError::Rejected`], which a gRPC
//! handler reports as `InvalidArgument` with the reason text verbatim.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::controller::CsiController;
use crate::engine::{Operation, ValidationEngine};
use crate::error::{CsiError, ValidationError};
use crate::oracle::Oracle;
use crate::types::*;
use crate::verdict::Verdict;
use crate::volume_spec::VolumeSpec;

/// Gates volume creation on a [`ValidationEngine`] verdict.
pub struct ValidatingController<C> {
    inner: C,
    engine: Arc<ValidationEngine>,
    oracle: Option<Arc<dyn Oracle>>,
}

/// Source side of a clone or restore.
struct TransitionSource {
    spec: VolumeSpec,
    operation: Operation,
}

fn evaluate(
    engine: &ValidationEngine,
    source: Option<&TransitionSource>,
    target: &VolumeSpec,
    oracle: Option<&dyn Oracle>,
) -> Result<Verdict, ValidationError> {
    match source {
        None => engine.evaluate_single(target, oracle),
        Some(src) => engine.evaluate_transition(&src.spec, target, src.operation, oracle),
    }
}

fn spec_of(volume: &Volume) -> Result<VolumeSpec, CsiError> {
    Ok(VolumeSpec::normalize_deferred(&volume.parameters)?.with_capacity(volume.capacity_bytes))
}

impl<C: CsiController> ValidatingController<C> {
    pub fn new(inner: C, engine: ValidationEngine) -> Self {
        Self {
            inner,
            engine: Arc::new(engine),
            oracle: None,
        }
    }

    /// Enable the principal, filesystem and base-path lookups.
    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn find_volume(&self, volume_id: &VolumeId) -> Result<Volume, CsiError> {
        self.inner
            .list_volumes()
            .await?
            .into_iter()
            .find(|v| &v.volume_id == volume_id)
            .ok_or_else(|| CsiError::VolumeNotFound(volume_id.to_string()))
    }

    async fn find_snapshot(&self, snapshot_id: &SnapshotId) -> Result<Snapshot, CsiError> {
        self.inner
            .list_snapshots()
            .await?
            .into_iter()
            .find(|s| &s.snapshot_id == snapshot_id)
            .ok_or_else(|| CsiError::SnapshotNotFound(snapshot_id.to_string()))
    }

    async fn transition_source(
        &self,
        content_source: Option<&VolumeContentSource>,
    ) -> Result<Option<TransitionSource>, CsiError> {
        let source = match content_source {
            None => return Ok(None),
            Some(VolumeContentSource::Volume(id)) => TransitionSource {
                spec: spec_of(&self.find_volume(id).await?)?,
                operation: Operation::Clone,
            },
            Some(VolumeContentSource::Snapshot(id)) => {
                let snapshot = self.find_snapshot(id).await?;
                // Backends that do not persist the source parameters fall
                // back to the live source volume.
                let spec = if snapshot.source_parameters.is_empty() {
                    spec_of(&self.find_volume(&snapshot.source_volume_id).await?)?
                } else {
                    VolumeSpec::normalize_deferred(&snapshot.source_parameters)?
                };
                TransitionSource {
                    spec: spec.with_capacity(snapshot.size_bytes),
                    operation: Operation::SnapshotRestore,
                }
            }
        };
        Ok(Some(source))
    }

    /// Run the engine for `req`.
    ///
    /// Oracle lookups may block on network I/O, so with an oracle configured
    /// the evaluation moves to Tokio's blocking pool.
    async fn decide(&self, req: &CreateVolumeRequest) -> Result<Verdict, CsiError> {
        let target =
            VolumeSpec::normalize_deferred(&req.parameters)?.with_capacity(req.capacity_bytes);
        let source = self.transition_source(req.content_source.as_ref()).await?;

        let Some(oracle) = self.oracle.clone() else {
            return Ok(evaluate(&self.engine, source.as_ref(), &target, None)?);
        };
        let engine = Arc::clone(&self.engine);
        let verdict = tokio::task::spawn_blocking(move || {
            evaluate(&engine, source.as_ref(), &target, Some(&*oracle))
        })
        .await
        .map_err(CsiError::internal)??;
        Ok(verdict)
    }
}

#[async_trait]
impl<C: CsiController> CsiController for ValidatingController<C> {
    #[instrument(skip(self, req), fields(name = %req.name))]
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume, CsiError> {
        match self.decide(&req).await {
            Ok(Verdict::Allow) => {
                info!(source = ?req.content_source, "volume request allowed");
                self.inner.create_volume(req).await
            }
            Ok(Verdict::Deny { reason, detail }) => {
                warn!(%reason, %detail, "volume request denied");
                Err(CsiError::Rejected { reason, detail })
            }
            Err(e) => {
                warn!(error = %e, "volume request could not be validated");
                Err(e)
            }
        }
    }

    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<(), CsiError> {
        self.inner.delete_volume(volume_id).await
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>, CsiError> {
        self.inner.list_volumes().await
    }

    /// Snapshots are not gated here; compatibility is decided when one is
    /// restored, against the source parameters recorded now.
    #[instrument(skip(self, req), fields(name = %req.name, source = %req.source_volume_id))]
    async fn create_snapshot(
        &self,
        mut req: CreateSnapshotRequest,
    ) -> Result<Snapshot, CsiError> {
        let source = self.find_volume(&req.source_volume_id).await?;
        req.source_parameters = source.parameters;
        self.inner.create_snapshot(req).await
    }

    async fn list_snapshots(&self) -> Result<Vec<Snapshot>, CsiError> {
        self.inner.list_snapshots().await
    }
}
