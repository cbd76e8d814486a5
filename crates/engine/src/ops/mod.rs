//! Edit operation algebra.
//!
//! Every operation takes the current document by reference and returns a new
//! one. The input is never touched, so a failed operation leaves the caller's
//! state exactly as it was. Each operation runs the invariant checker on its
//! output before returning.

mod delete;
mod insert;
mod lane;
mod moves;
mod split;
mod tracks;
mod trim;

pub use delete::{DeleteOptions, delete_clip};
pub use insert::{InsertOptions, insert_clip};
pub use moves::{MoveClipsOptions, MoveOptions, move_clip, move_clips};
pub use split::{SplitOptions, split_clip, split_linked_group};
pub use tracks::{
    AddTrackOptions, add_marker, add_track, remove_marker, remove_track, select_clips,
    set_playhead,
};
pub use trim::{TrimInOptions, TrimOptions, TrimOutOptions, trim_clip, trim_in, trim_out};

pub(crate) use lane::repack;

use crate::error::{EngineError, Result};
use crate::timeline::{Clip, ClipLocation, TimelineDoc};

pub(crate) fn locate(doc: &TimelineDoc, clip_id: &str) -> Result<ClipLocation> {
    doc.find_clip(clip_id)
        .ok_or_else(|| EngineError::clip_not_found(clip_id))
}

pub(crate) fn ensure_unlocked(clip: &Clip) -> Result<()> {
    if clip.locked {
        tracing::warn!(clip_id = %clip.id, "edit rejected: clip is locked");
        return Err(EngineError::ClipLocked {
            clip_id: clip.id.clone(),
        });
    }
    Ok(())
}

/// Checks the clip-level laws on a payload entering the timeline.
pub(crate) fn validate_payload(clip: &Clip) -> Result<()> {
    if clip.duration <= 0 {
        return Err(EngineError::NonPositiveDuration {
            clip_id: clip.id.clone(),
            duration: clip.duration,
        });
    }
    if clip.src_start < 0 {
        return Err(EngineError::NegativeSourceStart {
            clip_id: clip.id.clone(),
            src_start: clip.src_start,
        });
    }
    Ok(())
}
