use std::sync::Arc;

use serde::Serialize;

use crate::bridge::{BridgeOutcome, BridgeRequest, BridgeTransport, DesktopBridgeClient};
use crate::clock::{Clock, SystemClock};
use crate::domain::{ArchiveStatus, RemoteObjectRef, RestoreTier, SourceKind, SubjectContext};
use crate::error::PortalError;
use crate::index::derive_index;
use crate::locator::{PresignedAccess, RestoreOutcome, StorageObjectLocator};
use crate::naming::compose_for;
use crate::portal::{PortalClient, PresignOptions};

#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub object: String,
    pub status: ArchiveStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresignResult {
    pub object: String,
    pub access: PresignedAccess,
}

#[derive(Debug, Clone, Serialize)]
pub struct NameResult {
    pub path: String,
    pub subject_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexResult {
    pub path: String,
    pub index: String,
}

impl IndexResult {
    pub fn for_path(path: &str) -> Result<Self, PortalError> {
        Ok(Self {
            path: path.to_string(),
            index: derive_index(path)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenResult {
    pub object: String,
    pub request: BridgeRequest,
    #[serde(flatten)]
    pub outcome: BridgeOutcome,
}

/// Wires the locator and the desktop bridge for one-shot commands.
pub struct App<P: PortalClient, B: BridgeTransport, C: Clock = SystemClock> {
    locator: Arc<StorageObjectLocator<P, C>>,
    bridge: DesktopBridgeClient<B>,
    restore_gated: bool,
}

impl<P: PortalClient, B: BridgeTransport, C: Clock> App<P, B, C> {
    pub fn new(
        locator: Arc<StorageObjectLocator<P, C>>,
        bridge: DesktopBridgeClient<B>,
        restore_gated: bool,
    ) -> Self {
        Self {
            locator,
            bridge,
            restore_gated,
        }
    }

    pub fn locator(&self) -> &Arc<StorageObjectLocator<P, C>> {
        &self.locator
    }

    pub async fn status(&self, object: &RemoteObjectRef) -> Result<StatusResult, PortalError> {
        let status = self.locator.get_status(object).await?;
        Ok(StatusResult {
            object: object.to_string(),
            status,
        })
    }

    pub async fn presign(
        &self,
        object: &RemoteObjectRef,
        options: &PresignOptions,
    ) -> Result<PresignResult, PortalError> {
        let access = self.locator.get_presigned_url(object, options).await?;
        Ok(PresignResult {
            object: object.to_string(),
            access,
        })
    }

    pub async fn restore(
        &self,
        object: &RemoteObjectRef,
        days: u32,
        tier: RestoreTier,
    ) -> Result<RestoreOutcome, PortalError> {
        self.locator.request_restore(object, days, tier).await
    }

    pub async fn subject_context(&self, subject_id: &str) -> Result<SubjectContext, PortalError> {
        let record = self.locator.portal().subject(subject_id).await?;
        Ok(SubjectContext::new(record.id, record.lims))
    }

    pub async fn name(&self, path: &str, subject_id: &str) -> Result<NameResult, PortalError> {
        let context = self.subject_context(subject_id).await?;
        Ok(NameResult {
            path: path.to_string(),
            subject_id: subject_id.to_string(),
            name: compose_for(path, &context),
        })
    }

    /// Presigns the file and its index and hands both to the desktop
    /// companion. The companion reads plain URLs, so no streaming access.
    pub async fn open(
        &self,
        object: &RemoteObjectRef,
        subject_id: &str,
    ) -> Result<OpenResult, PortalError> {
        let index_path = derive_index(object.path())?;
        if self.restore_gated && object.source() == SourceKind::PrimaryStore {
            let status = self.locator.get_status(object).await?;
            if !status.is_available() {
                return Err(PortalError::NeedsRestore {
                    object: object.to_string(),
                    status,
                });
            }
        }

        let context = self.subject_context(subject_id).await?;
        let options = PresignOptions::default();
        let base = self.locator.get_presigned_url(object, &options).await?;
        let index_object = self.locator.locate_sibling(object, &index_path).await?;
        let index = self.locator.get_presigned_url(&index_object, &options).await?;

        let request = BridgeRequest {
            file: base.url,
            name: compose_for(object.path(), &context),
            index: Some(index.url),
        };
        let outcome = self.bridge.probe_open(&request).await;
        Ok(OpenResult {
            object: object.to_string(),
            request,
            outcome,
        })
    }
}
