use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::ArchiveStatus;

#[derive(Debug, Clone, Error, Diagnostic)]
pub enum PortalError {
    #[error("invalid object reference: {0}")]
    InvalidObjectRef(String),

    #[error("status unavailable for {object}: {reason}")]
    StatusUnavailable { object: String, reason: String },

    #[error("restore rejected for {object}: {reason}")]
    RestoreRejected { object: String, reason: String },

    #[error("presign failed for {object}: {reason}")]
    PresignFailed { object: String, reason: String },

    #[error("{object} is {status} and needs a restore before it can be viewed")]
    NeedsRestore {
        object: String,
        status: ArchiveStatus,
    },

    #[error("no index file convention matches {0}")]
    NoIndexAvailable(String),

    #[error("index file {0} was not found in the store")]
    IndexObjectNotFound(String),

    #[error("unsupported track format: {0}")]
    UnsupportedTrackFormat(String),

    #[error("track name {name} is already used by object {existing}")]
    DuplicateTrackName { name: String, existing: String },

    #[error("desktop companion is unreachable; open {uri} manually")]
    BridgeUnreachable { uri: String },

    #[error("visualization session refused to load {name}: {reason}")]
    TrackLoadFailed { name: String, reason: String },

    #[error("operation superseded by a newer request")]
    Superseded,

    #[error("bearer token unavailable: {0}")]
    TokenUnavailable(String),

    #[error("portal request failed: {0}")]
    PortalHttp(String),

    #[error("portal returned status {status}: {message}")]
    PortalStatus { status: u16, message: String },

    #[error("missing config file portal-tracks.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),
}
