use std::path::PathBuf;

use crate::invariants::Violation;
use crate::policy::TrackRole;
use crate::time::Tick;
use crate::timeline::{ClipId, LaneId, MarkerId, TrackId};

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse error taxonomy surfaced to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    InvariantViolation,
    PolicyViolation,
    MigrationFailure,
    Io,
}

/// Errors produced by timeline operations, history and persistence.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("clip not found: {clip_id}")]
    ClipNotFound { clip_id: ClipId },
    #[error("track not found: {track_id}")]
    TrackNotFound { track_id: TrackId },
    #[error("lane {lane_id} not found on track {track_id}")]
    LaneNotFound { track_id: TrackId, lane_id: LaneId },
    #[error("marker not found: {marker_id}")]
    MarkerNotFound { marker_id: MarkerId },

    #[error("clip {clip_id} must have a positive duration, got {duration}")]
    NonPositiveDuration { clip_id: ClipId, duration: Tick },
    #[error("clip {clip_id} has negative source start {src_start}")]
    NegativeSourceStart { clip_id: ClipId, src_start: Tick },
    #[error("clip {clip_id} has negative timeline start {start}")]
    NegativeStart { clip_id: ClipId, start: Tick },
    #[error("split point {at_time} is outside clip {clip_id} ({start}..{end})")]
    SplitOutOfBounds {
        clip_id: ClipId,
        at_time: Tick,
        start: Tick,
        end: Tick,
    },
    #[error("index {index} is out of range for a lane of {len} clips")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("clip id already in use: {clip_id}")]
    DuplicateClipId { clip_id: ClipId },
    #[error("track id already in use: {track_id}")]
    DuplicateTrackId { track_id: TrackId },
    #[error("marker id already in use: {marker_id}")]
    DuplicateMarkerId { marker_id: MarkerId },
    #[error("time must not be negative, got {time}")]
    NegativeTime { time: Tick },
    #[error("invalid timebase: {ticks_per_second} ticks per second")]
    InvalidTimebase { ticks_per_second: i64 },
    #[error("move of clip {clip_id} needs a target time, index, track or lane")]
    MissingMoveTarget { clip_id: ClipId },
    #[error("command was never applied: {label}")]
    CommandNotApplied { label: String },

    #[error("timeline invariant violated: {0}")]
    InvariantViolation(Violation),

    #[error("track {track_id} is magnetic and only accepts ripple edits")]
    RippleRequired { track_id: TrackId },
    #[error("clip {clip_id} collides with {existing_id} on lane {lane_id} of track {track_id}")]
    LaneCollision {
        track_id: TrackId,
        lane_id: LaneId,
        clip_id: ClipId,
        existing_id: ClipId,
    },
    #[error("clip {clip_id} is locked")]
    ClipLocked { clip_id: ClipId },
    #[error("timeline already has a main track")]
    DuplicateMainTrack,
    #[error("main track {track_id} cannot be removed")]
    MainTrackImmutable { track_id: TrackId },
    #[error("{role:?} tracks cannot hold overlapping clips")]
    OverlapNotAllowed { role: TrackRole },

    #[error("unrecognized session format: {reason}")]
    UnrecognizedFormat { reason: String },
    #[error("unsupported document version {version}")]
    UnsupportedVersion { version: u64 },
    #[error("document deserialization failed: {source}")]
    Deserialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("{context}: {} ({source})", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization failed for {} ({source})", .path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClipNotFound { .. }
            | Self::TrackNotFound { .. }
            | Self::LaneNotFound { .. }
            | Self::MarkerNotFound { .. } => ErrorKind::NotFound,
            Self::NonPositiveDuration { .. }
            | Self::NegativeSourceStart { .. }
            | Self::NegativeStart { .. }
            | Self::SplitOutOfBounds { .. }
            | Self::IndexOutOfRange { .. }
            | Self::DuplicateClipId { .. }
            | Self::DuplicateTrackId { .. }
            | Self::DuplicateMarkerId { .. }
            | Self::NegativeTime { .. }
            | Self::InvalidTimebase { .. }
            | Self::MissingMoveTarget { .. }
            | Self::CommandNotApplied { .. } => ErrorKind::InvalidArgument,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::RippleRequired { .. }
            | Self::LaneCollision { .. }
            | Self::ClipLocked { .. }
            | Self::DuplicateMainTrack
            | Self::MainTrackImmutable { .. }
            | Self::OverlapNotAllowed { .. } => ErrorKind::PolicyViolation,
            Self::UnrecognizedFormat { .. }
            | Self::UnsupportedVersion { .. }
            | Self::Deserialize { .. } => ErrorKind::MigrationFailure,
            Self::Io { .. } | Self::Serialization { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn clip_not_found(clip_id: &str) -> Self {
        Self::ClipNotFound {
            clip_id: clip_id.to_owned(),
        }
    }

    pub(crate) fn track_not_found(track_id: &str) -> Self {
        Self::TrackNotFound {
            track_id: track_id.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineError, ErrorKind};

    #[test]
    fn kind_groups_variants_by_taxonomy() {
        assert_eq!(EngineError::clip_not_found("c1").kind(), ErrorKind::NotFound);
        assert_eq!(
            EngineError::RippleRequired {
                track_id: "main".into()
            }
            .kind(),
            ErrorKind::PolicyViolation
        );
        assert_eq!(
            EngineError::UnsupportedVersion { version: 9 }.kind(),
            ErrorKind::MigrationFailure
        );
    }

    #[test]
    fn split_error_message_names_clip_bounds() {
        let error = EngineError::SplitOutOfBounds {
            clip_id: "c1".into(),
            at_time: 0,
            start: 0,
            end: 100,
        };
        assert_eq!(
            error.to_string(),
            "split point 0 is outside clip c1 (0..100)"
        );
    }
}
