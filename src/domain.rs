use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::PortalError;

/// Which of the two object stores holds an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Bucket/key addressed store with archive tiers and restores.
    PrimaryStore,
    /// Volume/path addressed store, presigned access only.
    SecondaryStore,
}

impl SourceKind {
    /// Path segment the portal REST surface uses for this store.
    pub fn api_segment(&self) -> &'static str {
        match self {
            SourceKind::PrimaryStore => "s3",
            SourceKind::SecondaryStore => "gds",
        }
    }

    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "s3" => Some(SourceKind::PrimaryStore),
            "gds" => Some(SourceKind::SecondaryStore),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_segment())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifies a single stored object. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteObjectRef {
    source: SourceKind,
    container: String,
    path: String,
    object_id: ObjectId,
}

impl RemoteObjectRef {
    pub fn new(
        source: SourceKind,
        container: impl Into<String>,
        path: impl Into<String>,
        object_id: impl Into<ObjectId>,
    ) -> Self {
        Self {
            source,
            container: container.into(),
            path: path.into(),
            object_id: object_id.into(),
        }
    }

    pub fn primary(
        bucket: impl Into<String>,
        key: impl Into<String>,
        object_id: impl Into<ObjectId>,
    ) -> Self {
        Self::new(SourceKind::PrimaryStore, bucket, key, object_id)
    }

    pub fn secondary(
        volume: impl Into<String>,
        path: impl Into<String>,
        object_id: impl Into<ObjectId>,
    ) -> Self {
        Self::new(SourceKind::SecondaryStore, volume, path, object_id)
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Store URI without the object id, e.g. `s3://bucket/key`.
    pub fn uri(&self) -> String {
        format!(
            "{}://{}/{}",
            self.source.api_segment(),
            self.container,
            self.path.trim_start_matches('/')
        )
    }
}

impl fmt::Display for RemoteObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.uri(), self.object_id)
    }
}

/// Parses `s3://bucket/key#id` and `gds://volume/path#id`.
impl FromStr for RemoteObjectRef {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || PortalError::InvalidObjectRef(value.to_string());
        let trimmed = value.trim();
        let (scheme, rest) = trimmed.split_once("://").ok_or_else(invalid)?;
        let source = SourceKind::from_scheme(scheme).ok_or_else(invalid)?;
        let (location, object_id) = rest.rsplit_once('#').ok_or_else(invalid)?;
        let (container, path) = location.split_once('/').ok_or_else(invalid)?;
        if container.is_empty() || path.is_empty() || object_id.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(source, container, path, object_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveStatus {
    Available,
    Archived,
    Restoring,
    Expired,
    Error,
}

impl ArchiveStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ArchiveStatus::Available)
    }
}

impl fmt::Display for ArchiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveStatus::Available => write!(f, "AVAILABLE"),
            ArchiveStatus::Archived => write!(f, "ARCHIVED"),
            ArchiveStatus::Restoring => write!(f, "RESTORING"),
            ArchiveStatus::Expired => write!(f, "EXPIRED"),
            ArchiveStatus::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackRole {
    BaseFile,
    IndexFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Alignment,
    VariantCall,
}

/// Extensions (without the leading dot) of read-alignment files.
pub const ALIGNMENT_EXTENSIONS: &[&str] = &["bam", "cram", "sam"];

/// Extensions (without the leading dot) of variant-call files.
pub const VARIANT_EXTENSIONS: &[&str] = &["vcf", "vcf.gz", "bcf"];

/// True when `path` ends with `.{extension}`.
pub fn has_extension(path: &str, extension: &str) -> bool {
    path.strip_suffix(extension)
        .is_some_and(|rest| rest.ends_with('.'))
}

impl TrackKind {
    pub fn from_path(path: &str) -> Result<Self, PortalError> {
        if ALIGNMENT_EXTENSIONS.iter().any(|ext| has_extension(path, ext)) {
            Ok(TrackKind::Alignment)
        } else if VARIANT_EXTENSIONS.iter().any(|ext| has_extension(path, ext)) {
            Ok(TrackKind::VariantCall)
        } else {
            Err(PortalError::UnsupportedTrackFormat(path.to_string()))
        }
    }

    /// Format label understood by the visualization widget.
    pub fn format_for(path: &str) -> &'static str {
        if path.ends_with(".cram") {
            "cram"
        } else if path.ends_with(".bam") {
            "bam"
        } else if path.ends_with(".sam") {
            "sam"
        } else if path.ends_with(".bcf") {
            "bcf"
        } else {
            "vcf"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "PascalCase")]
pub enum RestoreTier {
    #[serde(alias = "standard")]
    Standard,
    #[serde(alias = "bulk")]
    Bulk,
}

impl fmt::Display for RestoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreTier::Standard => write!(f, "Standard"),
            RestoreTier::Bulk => write!(f, "Bulk"),
        }
    }
}

/// Laboratory metadata row linking a subject's sample to a sequencing library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimsRecord {
    pub sample_id: String,
    pub library_id: String,
}

impl LimsRecord {
    pub fn new(sample_id: impl Into<String>, library_id: impl Into<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            library_id: library_id.into(),
        }
    }
}

/// The subject whose files are being viewed; scopes track names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectContext {
    pub subject_id: String,
    #[serde(default)]
    pub lims: Vec<LimsRecord>,
}

impl SubjectContext {
    pub fn new(subject_id: impl Into<String>, lims: Vec<LimsRecord>) -> Self {
        Self {
            subject_id: subject_id.into(),
            lims,
        }
    }
}
