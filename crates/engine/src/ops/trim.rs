use tracing::{debug, warn};

use super::lane::{carve, repack};
use super::{ensure_unlocked, locate};
use crate::error::{EngineError, Result};
use crate::invariants::checked;
use crate::policy::EditMode;
use crate::time::Tick;
use crate::timeline::{ClipId, ClipLocation, TimelineDoc};

/// Sets a clip's source in-point and visible length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimOptions {
    pub clip_id: ClipId,
    pub new_src_start: Option<Tick>,
    pub new_duration: Tick,
    pub mode: EditMode,
}

/// Moves a clip's in-point to an absolute timeline position, holding the out-point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimInOptions {
    pub clip_id: ClipId,
    pub new_start: Tick,
    pub mode: EditMode,
}

/// Moves a clip's out-point to an absolute timeline position, holding the in-point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimOutOptions {
    pub clip_id: ClipId,
    pub new_end: Tick,
    pub mode: EditMode,
}

/// Changes a clip's length and optionally its source in-point.
///
/// On magnetic tracks the downstream clips shift by the length change so the
/// lane stays gapless.
pub fn trim_clip(doc: &TimelineDoc, options: &TrimOptions) -> Result<TimelineDoc> {
    let mut out = doc.clone();
    let location = locate(&out, &options.clip_id)?;
    let clip = out.clip_at(location);
    let plan = TrimPlan {
        start: clip.start,
        src_start: options.new_src_start.unwrap_or(clip.src_start),
        duration: options.new_duration,
    };
    apply_trim(&mut out, location, plan, options.mode)?;
    checked(out, "trim")
}

pub fn trim_in(doc: &TimelineDoc, options: &TrimInOptions) -> Result<TimelineDoc> {
    let mut out = doc.clone();
    let location = locate(&out, &options.clip_id)?;
    let clip = out.clip_at(location);
    let delta = options.new_start - clip.start;
    let plan = TrimPlan {
        start: options.new_start,
        src_start: clip.src_start + delta,
        duration: clip.duration - delta,
    };
    apply_trim(&mut out, location, plan, options.mode)?;
    checked(out, "trim_in")
}

pub fn trim_out(doc: &TimelineDoc, options: &TrimOutOptions) -> Result<TimelineDoc> {
    let mut out = doc.clone();
    let location = locate(&out, &options.clip_id)?;
    let clip = out.clip_at(location);
    let plan = TrimPlan {
        start: clip.start,
        src_start: clip.src_start,
        duration: options.new_end - clip.start,
    };
    apply_trim(&mut out, location, plan, options.mode)?;
    checked(out, "trim_out")
}

#[derive(Debug, Clone, Copy)]
struct TrimPlan {
    /// Requested timeline start; derived on magnetic lanes.
    start: Tick,
    src_start: Tick,
    duration: Tick,
}

fn apply_trim(
    doc: &mut TimelineDoc,
    location: ClipLocation,
    plan: TrimPlan,
    mode: EditMode,
) -> Result<()> {
    let original = doc.clip_at(location).clone();
    ensure_unlocked(&original)?;
    if plan.duration <= 0 {
        warn!(clip_id = %original.id, duration = plan.duration, "trim rejected: non-positive duration");
        return Err(EngineError::NonPositiveDuration {
            clip_id: original.id,
            duration: plan.duration,
        });
    }
    if plan.src_start < 0 {
        warn!(clip_id = %original.id, src_start = plan.src_start, "trim rejected: negative source start");
        return Err(EngineError::NegativeSourceStart {
            clip_id: original.id,
            src_start: plan.src_start,
        });
    }

    let delta = plan.duration - original.duration;
    let track = &doc.tracks[location.track];
    let allow_overlap = track.allows_overlap();

    if track.is_magnetic() {
        let lane = doc.lane_at_mut(location);
        let clip = &mut lane.clips[location.index];
        clip.src_start = plan.src_start;
        clip.duration = plan.duration;
        for clip in lane.clips.iter_mut().skip(location.index + 1) {
            clip.start += delta;
        }
        repack(lane);

        debug!(clip_id = %original.id, delta, "magnetic trim accepted");
        return Ok(());
    }

    if plan.start < 0 {
        return Err(EngineError::NegativeStart {
            clip_id: original.id,
            start: plan.start,
        });
    }

    let new_end = plan.start + plan.duration;
    let tail_shift = new_end - original.end();

    {
        let lane = doc.lane_at_mut(location);
        let clip = &mut lane.clips[location.index];
        clip.start = plan.start;
        clip.src_start = plan.src_start;
        clip.duration = plan.duration;

        if mode == EditMode::Ripple && tail_shift != 0 {
            for clip in lane.clips.iter_mut() {
                if clip.id != original.id && clip.start >= original.end() {
                    clip.start += tail_shift;
                }
            }
        }
    }

    if !allow_overlap {
        if plan.start < original.start {
            let head_end = original.start.min(new_end);
            let lane = doc.lane_at(location);
            if let Some(existing) = lane.collision(plan.start, head_end, Some(&original.id)) {
                if mode == EditMode::Ripple {
                    warn!(clip_id = %original.id, existing_id = %existing.id, "trim rejected: head collides");
                    return Err(EngineError::LaneCollision {
                        track_id: doc.tracks[location.track].id.clone(),
                        lane_id: lane.id.clone(),
                        clip_id: original.id.clone(),
                        existing_id: existing.id.clone(),
                    });
                }
                carve(
                    doc,
                    location.track,
                    location.lane,
                    plan.start,
                    head_end,
                    Some(&original.id),
                )?;
            }
        }
        if mode == EditMode::Overwrite && new_end > original.end() {
            carve(
                doc,
                location.track,
                location.lane,
                original.end().max(plan.start),
                new_end,
                Some(&original.id),
            )?;
        }
    }

    doc.lane_at_mut(location)
        .clips
        .sort_by_key(|clip| clip.start);

    debug!(
        clip_id = %original.id,
        start = plan.start,
        src_start = plan.src_start,
        duration = plan.duration,
        mode = ?mode,
        "trim accepted"
    );
    Ok(())
}
