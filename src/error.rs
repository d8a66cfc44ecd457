// src/error.rs

use std::path::PathBuf;

use crate::engine_lib::anchor::{AnchorId, WorldId};

/// Errors raised by the portal subsystem.
///
/// None of these are fatal: frame-level callers log them and carry on.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("anchor {0} has no linked anchor")]
    UnlinkedAnchor(AnchorId),

    #[error("unknown anchor {0}")]
    UnknownAnchor(AnchorId),

    #[error("switch to world {requested} rejected: load of world {pending} is still pending")]
    ReentrantSwitch { requested: WorldId, pending: WorldId },

    #[error("render target allocation failed: {0}")]
    TargetAllocation(String),

    #[error("failed to read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    #[error("failed to write config: {0}")]
    ConfigWrite(#[from] ron::Error),
}

pub type PortalResult<T> = Result<T, PortalError>;
