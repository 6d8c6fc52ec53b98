#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::TimeDelta;

use portal_tracks::archive::HeadObject;
use portal_tracks::clock::ManualClock;
use portal_tracks::domain::{LimsRecord, RemoteObjectRef, SourceKind, SubjectContext};
use portal_tracks::error::PortalError;
use portal_tracks::portal::{
    PortalClient, PresignOptions, PresignResponse, RestoreRequest, RestoreResponse,
    StatusResponse, SubjectRecord,
};
use portal_tracks::reconcile::TrackWidget;
use portal_tracks::tracks::LoadInstruction;

#[derive(Default)]
pub struct MockPortal {
    pub heads: Mutex<HashMap<String, HeadObject>>,
    pub status_failures: Mutex<HashSet<String>>,
    pub presign_failures: Mutex<HashSet<String>>,
    pub presign_calls: Mutex<Vec<String>>,
    pub status_calls: Mutex<usize>,
    pub objects: Mutex<Vec<RemoteObjectRef>>,
    pub restores: Mutex<Vec<(String, u32)>>,
    pub restore_error: Mutex<Option<String>>,
    pub subjects: Mutex<HashMap<String, SubjectRecord>>,
    pub signed_url_suffix: Mutex<Option<String>>,
    /// Clock moved forward while each presign is in flight.
    pub presign_latency: Mutex<Option<(Arc<ManualClock>, TimeDelta)>>,
}

impl MockPortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head(self, object_id: &str, head: HeadObject) -> Self {
        self.heads.lock().unwrap().insert(object_id.to_string(), head);
        self
    }

    pub fn with_object(self, object: RemoteObjectRef) -> Self {
        self.objects.lock().unwrap().push(object);
        self
    }

    pub fn with_subject(self, subject_id: &str, lims: Vec<LimsRecord>) -> Self {
        self.subjects.lock().unwrap().insert(
            subject_id.to_string(),
            SubjectRecord {
                id: subject_id.to_string(),
                lims,
            },
        );
        self
    }

    pub fn fail_presign(&self, object_id: &str) {
        self.presign_failures
            .lock()
            .unwrap()
            .insert(object_id.to_string());
    }

    pub fn fail_status(&self, object_id: &str) {
        self.status_failures
            .lock()
            .unwrap()
            .insert(object_id.to_string());
    }

    pub fn delay_presign(&self, clock: Arc<ManualClock>, by: TimeDelta) {
        *self.presign_latency.lock().unwrap() = Some((clock, by));
    }

    pub fn presign_count(&self) -> usize {
        self.presign_calls.lock().unwrap().len()
    }

    pub fn presign_count_for(&self, object_id: &str) -> usize {
        self.presign_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == object_id)
            .count()
    }
}

#[async_trait]
impl PortalClient for MockPortal {
    async fn object_status(&self, object: &RemoteObjectRef) -> Result<StatusResponse, PortalError> {
        tokio::task::yield_now().await;
        *self.status_calls.lock().unwrap() += 1;
        let id = object.object_id().as_str();
        if self.status_failures.lock().unwrap().contains(id) {
            return Err(PortalError::PortalStatus {
                status: 403,
                message: "forbidden".to_string(),
            });
        }
        let head = self
            .heads
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_else(|| HeadObject::with_storage_class("STANDARD"));
        Ok(StatusResponse {
            bucket: Some(object.container().to_string()),
            key: Some(object.path().to_string()),
            head_object: head,
        })
    }

    async fn presign(
        &self,
        object: &RemoteObjectRef,
        _options: &PresignOptions,
    ) -> Result<PresignResponse, PortalError> {
        tokio::task::yield_now().await;
        if let Some((clock, by)) = self.presign_latency.lock().unwrap().as_ref() {
            clock.advance(*by);
        }
        let id = object.object_id().as_str().to_string();
        let call = {
            let mut calls = self.presign_calls.lock().unwrap();
            calls.push(id.clone());
            calls.len()
        };
        if self.presign_failures.lock().unwrap().contains(&id) {
            return Ok(PresignResponse {
                signed_url: None,
                error: Some(serde_json::Value::String("AccessDenied".to_string())),
            });
        }
        let suffix = self.signed_url_suffix.lock().unwrap().clone().unwrap_or_default();
        Ok(PresignResponse {
            signed_url: Some(format!(
                "https://signed.example/{}/{}?call={call}{suffix}",
                object.container(),
                object.path()
            )),
            error: None,
        })
    }

    async fn restore(
        &self,
        object: &RemoteObjectRef,
        request: &RestoreRequest,
    ) -> Result<RestoreResponse, PortalError> {
        self.restores
            .lock()
            .unwrap()
            .push((object.object_id().to_string(), request.days));
        let error = self
            .restore_error
            .lock()
            .unwrap()
            .clone()
            .map(serde_json::Value::String);
        Ok(RestoreResponse { error })
    }

    async fn subject(&self, subject_id: &str) -> Result<SubjectRecord, PortalError> {
        self.subjects
            .lock()
            .unwrap()
            .get(subject_id)
            .cloned()
            .ok_or_else(|| PortalError::PortalStatus {
                status: 404,
                message: "subject not found".to_string(),
            })
    }

    async fn find_object(
        &self,
        source: SourceKind,
        container: &str,
        path: &str,
    ) -> Result<Option<RemoteObjectRef>, PortalError> {
        tokio::task::yield_now().await;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .find(|object| {
                object.source() == source && object.container() == container && object.path() == path
            })
            .cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetCall {
    Load(String),
    Unload(String),
}

#[derive(Clone, Default)]
pub struct RecordingWidget {
    pub calls: Arc<Mutex<Vec<WidgetCall>>>,
    pub loaded: Arc<Mutex<HashSet<String>>>,
    pub refuse_loads: Arc<Mutex<HashSet<String>>>,
    /// While set, `load` never completes.
    pub hang_loads: Arc<Mutex<bool>>,
}

impl RecordingWidget {
    pub fn calls(&self) -> Vec<WidgetCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.lock().unwrap().iter().cloned().collect();
        names.sort();
        names
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl TrackWidget for RecordingWidget {
    async fn unload(&mut self, name: &str) -> Result<bool, PortalError> {
        self.calls
            .lock()
            .unwrap()
            .push(WidgetCall::Unload(name.to_string()));
        Ok(self.loaded.lock().unwrap().remove(name))
    }

    async fn load(&mut self, instruction: &LoadInstruction) -> Result<(), PortalError> {
        self.calls
            .lock()
            .unwrap()
            .push(WidgetCall::Load(instruction.name.clone()));
        let hang = *self.hang_loads.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        if self.refuse_loads.lock().unwrap().contains(&instruction.name) {
            return Err(PortalError::PortalHttp("widget rejected track".to_string()));
        }
        self.loaded.lock().unwrap().insert(instruction.name.clone());
        Ok(())
    }
}

pub fn context() -> SubjectContext {
    SubjectContext::new(
        "SBJ001",
        vec![
            LimsRecord::new("PRJ001", "L001"),
            LimsRecord::new("PRJ001", "L002"),
        ],
    )
}

/// A primary-store base file plus its registered index object.
pub fn primary_pair(portal: MockPortal, id: &str, key: &str, index_suffix: &str) -> MockPortal {
    portal.with_object(RemoteObjectRef::primary(
        "primary-bucket",
        format!("{key}{index_suffix}"),
        format!("{id}-idx"),
    ))
}

pub fn primary(id: &str, key: &str) -> RemoteObjectRef {
    RemoteObjectRef::primary("primary-bucket", key, id)
}

pub fn secondary(id: &str, path: &str) -> RemoteObjectRef {
    RemoteObjectRef::secondary("production", path, id)
}
