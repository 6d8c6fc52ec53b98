use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{ObjectId, RemoteObjectRef, SubjectContext, TrackKind, TrackRole};
use crate::error::PortalError;
use crate::index::derive_index;
use crate::locator::PresignedAccess;
use crate::naming::compose_for;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackDescriptor {
    pub name: String,
    pub object_id: ObjectId,
    pub object: RemoteObjectRef,
    pub role: TrackRole,
    pub kind: TrackKind,
}

impl TrackDescriptor {
    /// Base-file descriptor named within `context`.
    pub fn base(object: RemoteObjectRef, context: &SubjectContext) -> Result<Self, PortalError> {
        let kind = TrackKind::from_path(object.path())?;
        Ok(Self {
            name: compose_for(object.path(), context),
            object_id: object.object_id().clone(),
            object,
            role: TrackRole::BaseFile,
            kind,
        })
    }

    pub fn index_path(&self) -> Result<String, PortalError> {
        derive_index(self.object.path())
    }

    /// Index descriptor paired with this base file; shares its name.
    pub fn index_for(&self, index_object: RemoteObjectRef) -> Self {
        Self {
            name: self.name.clone(),
            object_id: index_object.object_id().clone(),
            object: index_object,
            role: TrackRole::IndexFile,
            kind: self.kind,
        }
    }

    pub fn format(&self) -> &'static str {
        TrackKind::format_for(self.object.path())
    }
}

/// Tracks keyed by object id. Names are unique within a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSet {
    tracks: HashMap<ObjectId, TrackDescriptor>,
    names: HashMap<String, ObjectId>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the desired set for a selection of files of one subject.
    pub fn from_selection<I>(objects: I, context: &SubjectContext) -> Result<Self, PortalError>
    where
        I: IntoIterator<Item = RemoteObjectRef>,
    {
        let mut set = Self::new();
        for object in objects {
            set.insert(TrackDescriptor::base(object, context)?)?;
        }
        Ok(set)
    }

    /// Fails when `descriptor`'s name is held by a different object.
    pub fn check_name(&self, descriptor: &TrackDescriptor) -> Result<(), PortalError> {
        match self.names.get(&descriptor.name) {
            Some(existing) if *existing != descriptor.object_id => {
                Err(PortalError::DuplicateTrackName {
                    name: descriptor.name.clone(),
                    existing: existing.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Inserts or replaces the descriptor for its object id. A name held by
    /// a different object is rejected.
    pub fn insert(&mut self, descriptor: TrackDescriptor) -> Result<(), PortalError> {
        self.check_name(&descriptor)?;
        let object_id = descriptor.object_id.clone();
        let name = descriptor.name.clone();
        if let Some(previous) = self.tracks.insert(object_id.clone(), descriptor) {
            if previous.name != name {
                self.names.remove(&previous.name);
            }
        }
        self.names.insert(name, object_id);
        Ok(())
    }

    pub fn remove(&mut self, object_id: &ObjectId) -> Option<TrackDescriptor> {
        let removed = self.tracks.remove(object_id)?;
        self.names.remove(&removed.name);
        Some(removed)
    }

    pub fn get(&self, object_id: &ObjectId) -> Option<&TrackDescriptor> {
        self.tracks.get(object_id)
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.tracks.contains_key(object_id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.names.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.tracks.values()
    }

    /// Object ids in ascending order.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.tracks.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// `self` is the loaded set, `desired` the wanted one; both sides of the
    /// delta are sorted by object id.
    pub fn diff(&self, desired: &TrackSet) -> TrackDelta {
        let mut to_remove: Vec<TrackDescriptor> = self
            .tracks
            .iter()
            .filter(|(id, _)| !desired.tracks.contains_key(*id))
            .map(|(_, track)| track.clone())
            .collect();
        let mut to_add: Vec<TrackDescriptor> = desired
            .tracks
            .iter()
            .filter(|(id, _)| !self.tracks.contains_key(*id))
            .map(|(_, track)| track.clone())
            .collect();
        to_remove.sort_by(|a, b| a.object_id.cmp(&b.object_id));
        to_add.sort_by(|a, b| a.object_id.cmp(&b.object_id));
        TrackDelta { to_remove, to_add }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackDelta {
    pub to_remove: Vec<TrackDescriptor>,
    pub to_add: Vec<TrackDescriptor>,
}

impl TrackDelta {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Where the visualization session reads a track from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackSource {
    /// htsget-style streaming; the server handles index lookups.
    Htsget {
        url: String,
        #[serde(skip_serializing)]
        bearer_token: String,
    },
    Presigned {
        base: PresignedAccess,
        index: PresignedAccess,
    },
}

impl TrackSource {
    pub fn url(&self) -> &str {
        match self {
            TrackSource::Htsget { url, .. } => url,
            TrackSource::Presigned { base, .. } => &base.url,
        }
    }

    pub fn index_url(&self) -> Option<&str> {
        match self {
            TrackSource::Htsget { .. } => None,
            TrackSource::Presigned { index, .. } => Some(&index.url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadInstruction {
    pub name: String,
    pub object_id: ObjectId,
    pub kind: TrackKind,
    pub format: String,
    pub source: TrackSource,
}
