use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::clock::{Clock, SystemClock};
use crate::domain::{ObjectId, SourceKind, SubjectContext, TrackKind};
use crate::error::PortalError;
use crate::locator::StorageObjectLocator;
use crate::naming::compose_for;
use crate::portal::{PortalClient, PresignOptions};
use crate::tracks::{LoadInstruction, TrackDescriptor, TrackSet, TrackSource};

/// The genome-browser widget. It knows tracks only by name.
#[async_trait]
pub trait TrackWidget: Send {
    /// Unloads `name`; `Ok(false)` when nothing by that name was loaded.
    async fn unload(&mut self, name: &str) -> Result<bool, PortalError>;

    async fn load(&mut self, instruction: &LoadInstruction) -> Result<(), PortalError>;
}

/// How additions reach the widget.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    /// Primary-store tracks stream from here when set.
    pub htsget_base_url: Option<String>,
    /// Check the archive status of primary-store tracks before loading.
    pub restore_gated: bool,
}

/// Live widget state. Only the reconciler touches it.
pub struct Session<W: TrackWidget> {
    widget: W,
    current: TrackSet,
    context: SubjectContext,
}

impl<W: TrackWidget> Session<W> {
    pub fn new(widget: W, context: SubjectContext) -> Self {
        Self {
            widget,
            current: TrackSet::new(),
            context,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedTrack {
    pub object_id: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AdditionOutcome {
    pub object_id: ObjectId,
    pub name: String,
    pub result: Result<LoadInstruction, PortalError>,
}

impl AdditionOutcome {
    pub fn is_loaded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn needs_restore(&self) -> bool {
        matches!(self.result, Err(PortalError::NeedsRestore { .. }))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationResult {
    pub to_remove: Vec<ObjectId>,
    pub to_add: Vec<ObjectId>,
    pub removed: Vec<RemovedTrack>,
    pub additions: Vec<AdditionOutcome>,
    /// A newer call or a cancel arrived; unapplied work was dropped.
    pub superseded: bool,
}

impl ReconciliationResult {
    pub fn is_noop(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    pub fn loaded(&self) -> impl Iterator<Item = &AdditionOutcome> {
        self.additions.iter().filter(|outcome| outcome.is_loaded())
    }

    pub fn failures(&self) -> impl Iterator<Item = &AdditionOutcome> {
        self.additions.iter().filter(|outcome| !outcome.is_loaded())
    }
}

/// Single entry point for mutating a visualization session.
///
/// Calls are serialized on the session lock. Every call takes a new
/// generation; an older call that wakes up behind a newer one stops before
/// its next widget mutation. Whatever it already applied stays recorded.
pub struct TrackSetReconciler<W, P, T, C = SystemClock>
where
    W: TrackWidget,
    P: PortalClient,
    T: TokenProvider,
    C: Clock,
{
    session: Mutex<Session<W>>,
    locator: Arc<StorageObjectLocator<P, C>>,
    tokens: T,
    policy: AccessPolicy,
    generation: AtomicU64,
}

impl<W, P, T, C> TrackSetReconciler<W, P, T, C>
where
    W: TrackWidget,
    P: PortalClient,
    T: TokenProvider,
    C: Clock,
{
    pub fn new(
        session: Session<W>,
        locator: Arc<StorageObjectLocator<P, C>>,
        tokens: T,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            locator,
            tokens,
            policy,
            generation: AtomicU64::new(0),
        }
    }

    pub fn locator(&self) -> &StorageObjectLocator<P, C> {
        &self.locator
    }

    /// Snapshot of what the session has loaded.
    pub async fn current(&self) -> TrackSet {
        self.session.lock().await.current.clone()
    }

    pub async fn context(&self) -> SubjectContext {
        self.session.lock().await.context.clone()
    }

    /// Gives read access to the widget, e.g. for inspection.
    pub async fn with_widget<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        let session = self.session.lock().await;
        f(&session.widget)
    }

    /// Abandons any in-flight reconcile.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Switches the viewed subject: in-flight work is abandoned, every
    /// loaded track is unloaded under the old subject's names and the
    /// session starts empty.
    pub async fn change_subject(&self, context: SubjectContext) -> Vec<RemovedTrack> {
        self.cancel();
        self.locator.invalidate_context();
        let mut session = self.session.lock().await;
        let loaded: Vec<TrackDescriptor> = session.current.iter().cloned().collect();
        let mut removed = Vec::with_capacity(loaded.len());
        for track in loaded {
            let name = compose_for(track.object.path(), &session.context);
            unload_quietly(&mut session.widget, &name).await;
            removed.push(RemovedTrack {
                object_id: track.object_id,
                name,
            });
        }
        session.current.clear();
        info!(subject = %context.subject_id, unloaded = removed.len(), "subject changed");
        session.context = context;
        removed
    }

    pub async fn reconcile(&self, desired: &TrackSet) -> ReconciliationResult {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut session = self.session.lock().await;

        let delta = session.current.diff(desired);
        let mut result = ReconciliationResult {
            to_remove: delta.to_remove.iter().map(|t| t.object_id.clone()).collect(),
            to_add: delta.to_add.iter().map(|t| t.object_id.clone()).collect(),
            ..ReconciliationResult::default()
        };
        if !self.is_current(generation) {
            debug!(generation, "reconcile superseded before start");
            result.superseded = true;
            return result;
        }

        for track in delta.to_remove {
            if !self.is_current(generation) {
                result.superseded = true;
                return result;
            }
            let name = compose_for(track.object.path(), &session.context);
            unload_quietly(&mut session.widget, &name).await;
            session.current.remove(&track.object_id);
            result.removed.push(RemovedTrack {
                object_id: track.object_id,
                name,
            });
        }

        let context = session.context.clone();
        let resolutions = join_all(
            delta
                .to_add
                .iter()
                .map(|track| self.resolve(track, &context)),
        )
        .await;

        for (track, resolution) in delta.to_add.into_iter().zip(resolutions) {
            let object_id = track.object_id.clone();
            let name = compose_for(track.object.path(), &context);
            let outcome = if !self.is_current(generation) {
                result.superseded = true;
                Err(PortalError::Superseded)
            } else {
                match resolution {
                    Ok(instruction) => apply_addition(&mut session, track, instruction).await,
                    Err(err) => Err(err),
                }
            };
            if let Err(err) = &outcome {
                warn!(object = %object_id, %name, error = %err, "track addition failed");
            }
            result.additions.push(AdditionOutcome {
                object_id,
                name,
                result: outcome,
            });
        }

        if result.superseded {
            debug!(generation, "reconcile superseded; remaining additions dropped");
        } else {
            info!(
                removed = result.removed.len(),
                loaded = result.loaded().count(),
                failed = result.failures().count(),
                "reconciled session"
            );
        }
        result
    }

    async fn resolve(
        &self,
        track: &TrackDescriptor,
        context: &SubjectContext,
    ) -> Result<LoadInstruction, PortalError> {
        let index_path = track.index_path()?;
        let object = &track.object;
        let primary = object.source() == SourceKind::PrimaryStore;

        if primary && self.policy.restore_gated {
            let status = self.locator.get_status(object).await?;
            if !status.is_available() {
                return Err(PortalError::NeedsRestore {
                    object: object.to_string(),
                    status,
                });
            }
        }

        let source = match (&self.policy.htsget_base_url, primary) {
            (Some(endpoint), true) => TrackSource::Htsget {
                url: htsget_url(endpoint, track),
                bearer_token: self.tokens.token().await?,
            },
            _ => {
                let options = PresignOptions::default();
                let base = self.locator.get_presigned_url(object, &options).await?;
                let index_object = self.locator.locate_sibling(object, &index_path).await?;
                let index = self
                    .locator
                    .get_presigned_url(&index_object, &options)
                    .await?;
                TrackSource::Presigned { base, index }
            }
        };

        Ok(LoadInstruction {
            name: compose_for(object.path(), context),
            object_id: track.object_id.clone(),
            kind: track.kind,
            format: track.format().to_string(),
            source,
        })
    }
}

async fn unload_quietly<W: TrackWidget>(widget: &mut W, name: &str) {
    match widget.unload(name).await {
        Ok(true) => debug!(%name, "unloaded track"),
        Ok(false) => debug!(%name, "track was not loaded"),
        Err(err) => warn!(%name, error = %err, "widget refused unload; recording as removed"),
    }
}

/// Records the track only once the widget has accepted it. If this future
/// is dropped mid-load, nothing is recorded and the next reconcile retries.
async fn apply_addition<W: TrackWidget>(
    session: &mut Session<W>,
    mut track: TrackDescriptor,
    instruction: LoadInstruction,
) -> Result<LoadInstruction, PortalError> {
    track.name = instruction.name.clone();
    session.current.check_name(&track)?;
    if let Err(err) = session.widget.load(&instruction).await {
        return Err(PortalError::TrackLoadFailed {
            name: instruction.name,
            reason: err.to_string(),
        });
    }
    session.current.insert(track)?;
    Ok(instruction)
}

fn htsget_url(endpoint: &str, track: &TrackDescriptor) -> String {
    const READS: &[&str] = &[".bam", ".cram"];
    const VARIANTS: &[&str] = &[".vcf.gz", ".vcf"];
    let (endpoint_kind, suffixes) = match track.kind {
        TrackKind::Alignment => ("reads", READS),
        TrackKind::VariantCall => ("variants", VARIANTS),
    };
    let key = track.object.path().trim_start_matches('/');
    let stem = suffixes
        .iter()
        .find_map(|suffix| key.strip_suffix(suffix))
        .unwrap_or(key);
    format!(
        "{}/{}/{}/{}",
        endpoint.trim_end_matches('/'),
        endpoint_kind,
        track.object.container(),
        stem
    )
}
