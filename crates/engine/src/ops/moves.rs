use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::delete::remove_clip;
use super::insert::{InsertOptions, place_clip};
use super::lane::repack;
use super::{ensure_unlocked, locate};
use crate::error::{EngineError, Result};
use crate::invariants::checked;
use crate::policy::EditMode;
use crate::time::Tick;
use crate::timeline::{ClipId, ClipLocation, Lane, LaneId, TimelineDoc, TrackId};

/// Where a clip should go.
///
/// On magnetic lanes the clip is reordered: `to_index` wins, otherwise the
/// clip lands in front of the first other clip whose midpoint is at or after
/// `to_time`. On other lanes `to_time` is the new start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveOptions {
    pub clip_id: ClipId,
    pub to_time: Option<Tick>,
    pub to_track_id: Option<TrackId>,
    pub to_lane_id: Option<LaneId>,
    pub to_index: Option<usize>,
    pub mode: EditMode,
}

impl MoveOptions {
    pub fn to_time(clip_id: impl Into<ClipId>, to_time: Tick) -> Self {
        Self {
            clip_id: clip_id.into(),
            to_time: Some(to_time),
            ..Self::default()
        }
    }

    pub fn to_index(clip_id: impl Into<ClipId>, to_index: usize) -> Self {
        Self {
            clip_id: clip_id.into(),
            to_index: Some(to_index),
            ..Self::default()
        }
    }

    pub fn on_track(mut self, track_id: impl Into<TrackId>) -> Self {
        self.to_track_id = Some(track_id.into());
        self
    }

    pub fn in_lane(mut self, lane_id: impl Into<LaneId>) -> Self {
        self.to_lane_id = Some(lane_id.into());
        self
    }

    pub fn mode(mut self, mode: EditMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Shifts several clips by the same amount of time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveClipsOptions {
    pub clip_ids: Vec<ClipId>,
    pub delta: Tick,
    /// Pull in every clip sharing a linked group with a listed clip.
    pub include_linked: bool,
    pub mode: EditMode,
}

/// Moves one clip within its lane, to another lane, or to another track.
///
/// Leaving a magnetic lane always ripples so the lane stays gapless.
///
/// # Example
/// ```
/// use timeline_engine::{Clip, InsertOptions, MoveOptions, Timebase};
/// use timeline_engine::{create_empty_timeline, insert_clip, move_clip};
///
/// let mut doc = create_empty_timeline(Timebase::MILLIS);
/// for id in ["a", "b", "c"] {
///     doc = insert_clip(&doc, &InsertOptions::new("main", Clip::new(id, "src", 0, 1_000)))
///         .expect("insert");
/// }
///
/// let doc = move_clip(&doc, &MoveOptions::to_index("a", 2)).expect("move");
/// let order: Vec<_> = doc.main_clips().iter().map(|clip| clip.id.as_str()).collect();
/// assert_eq!(order, ["b", "c", "a"]);
/// ```
pub fn move_clip(doc: &TimelineDoc, options: &MoveOptions) -> Result<TimelineDoc> {
    let mut out = doc.clone();
    relocate(&mut out, options)?;
    checked(out, "move")
}

pub fn move_clips(doc: &TimelineDoc, options: &MoveClipsOptions) -> Result<TimelineDoc> {
    let mut out = doc.clone();
    let members = expand_members(&out, options)?;
    if options.delta == 0 || members.is_empty() {
        return checked(out, "move_clips");
    }

    let mut magnetic = Vec::new();
    let mut lifted = Vec::new();
    for clip_id in &members {
        let location = locate(&out, clip_id)?;
        let track = &out.tracks[location.track];
        if track.is_magnetic() {
            magnetic.push((clip_id.clone(), out.clip_at(location).start));
        } else {
            let track_id = track.id.clone();
            let lane_id = out.lane_at(location).id.clone();
            let clip = out.lane_at_mut(location).clips.remove(location.index);
            lifted.push((track_id, lane_id, clip));
        }
    }

    lifted.sort_by_key(|(_, _, clip)| clip.start);
    for (track_id, lane_id, mut clip) in lifted {
        let start = clip.start + options.delta;
        if start < 0 {
            warn!(clip_id = %clip.id, start, "move rejected: negative start");
            return Err(EngineError::NegativeStart {
                clip_id: clip.id,
                start,
            });
        }
        clip.start = start;
        let insert = InsertOptions {
            track_id,
            lane_id: Some(lane_id),
            clip,
            at_index: None,
            mode: options.mode,
        };
        place_clip(&mut out, &insert)?;
    }

    // Walk against the direction of travel so earlier reorders don't block later ones.
    if options.delta > 0 {
        magnetic.sort_by_key(|(_, start)| std::cmp::Reverse(*start));
    } else {
        magnetic.sort_by_key(|(_, start)| *start);
    }
    for (clip_id, start) in magnetic {
        let location = locate(&out, &clip_id)?;
        reorder(&mut out, location, None, Some(start + options.delta))?;
    }

    debug!(
        member_count = members.len(),
        delta = options.delta,
        mode = ?options.mode,
        "group move accepted"
    );
    checked(out, "move_clips")
}

fn expand_members(doc: &TimelineDoc, options: &MoveClipsOptions) -> Result<Vec<ClipId>> {
    let mut seen = BTreeSet::new();
    let mut members = Vec::new();
    for clip_id in &options.clip_ids {
        let clip = doc.clip_at(locate(doc, clip_id)?);
        let group = match (&clip.linked_group_id, options.include_linked) {
            (Some(group_id), true) => doc.linked_group(group_id),
            _ => vec![clip.id.clone()],
        };
        for member in group {
            if seen.insert(member.clone()) {
                members.push(member);
            }
        }
    }
    for clip_id in &members {
        ensure_unlocked(doc.clip_at(locate(doc, clip_id)?))?;
    }
    Ok(members)
}

fn relocate(doc: &mut TimelineDoc, options: &MoveOptions) -> Result<()> {
    if options.to_time.is_none()
        && options.to_track_id.is_none()
        && options.to_lane_id.is_none()
        && options.to_index.is_none()
    {
        return Err(EngineError::MissingMoveTarget {
            clip_id: options.clip_id.clone(),
        });
    }

    let location = locate(doc, &options.clip_id)?;
    ensure_unlocked(doc.clip_at(location))?;

    let track = match &options.to_track_id {
        Some(track_id) => doc
            .track_index(track_id)
            .ok_or_else(|| EngineError::track_not_found(track_id))?,
        None => location.track,
    };
    let lane = match &options.to_lane_id {
        Some(lane_id) => Some(doc.tracks[track].lane_index(lane_id).ok_or_else(|| {
            EngineError::LaneNotFound {
                track_id: doc.tracks[track].id.clone(),
                lane_id: lane_id.clone(),
            }
        })?),
        None if track == location.track => Some(location.lane),
        None => None,
    };

    if track == location.track && lane == Some(location.lane) {
        if doc.tracks[track].is_magnetic() {
            return reorder(doc, location, options.to_index, options.to_time);
        }
        return shift_in_lane(doc, location, options);
    }

    let track_id = doc.tracks[track].id.clone();
    let lane_id = lane.map(|index| doc.tracks[track].lanes()[index].id.clone());
    let mut clip = remove_clip(doc, &options.clip_id, EditMode::Ripple)?;

    let destination = doc.tracks[track]
        .lanes()
        .get(lane.unwrap_or(0))
        .map(|lane| lane.clips.as_slice())
        .unwrap_or_default();
    let at_index = if doc.tracks[track].is_magnetic() {
        let index = match (options.to_index, options.to_time) {
            (Some(index), _) => index,
            (None, Some(time)) => index_for_time(destination, time, None),
            (None, None) => destination.len(),
        };
        Some(index.min(destination.len()))
    } else {
        if let Some(time) = options.to_time {
            clip.start = time;
        }
        None
    };

    debug!(
        clip_id = %clip.id,
        to_track_id = %track_id,
        to_lane_id = ?lane_id,
        at_index = ?at_index,
        start = clip.start,
        "move across lanes accepted"
    );
    let insert = InsertOptions {
        track_id,
        lane_id,
        clip,
        at_index,
        mode: options.mode,
    };
    place_clip(doc, &insert).map(|_| ())
}

fn shift_in_lane(doc: &mut TimelineDoc, location: ClipLocation, options: &MoveOptions) -> Result<()> {
    let Some(to_time) = options.to_time else {
        return Err(EngineError::MissingMoveTarget {
            clip_id: options.clip_id.clone(),
        });
    };
    if doc.clip_at(location).start == to_time {
        debug!(clip_id = %options.clip_id, "move is a no-op");
        return Ok(());
    }

    let track_id = doc.tracks[location.track].id.clone();
    let lane_id = doc.lane_at(location).id.clone();
    let mut clip = doc.lane_at_mut(location).clips.remove(location.index);
    clip.start = to_time;

    debug!(clip_id = %clip.id, to_time, mode = ?options.mode, "move within lane accepted");
    let insert = InsertOptions {
        track_id,
        lane_id: Some(lane_id),
        clip,
        at_index: None,
        mode: options.mode,
    };
    place_clip(doc, &insert).map(|_| ())
}

/// Reorders a clip inside its magnetic lane and repacks the lane.
fn reorder(
    doc: &mut TimelineDoc,
    location: ClipLocation,
    to_index: Option<usize>,
    to_time: Option<Tick>,
) -> Result<()> {
    let lane = doc.lane_at(location);
    let moving = &lane.clips[location.index];
    let last = lane.clips.len() - 1;
    let target = match (to_index, to_time) {
        (Some(index), _) => index.min(last),
        (None, Some(time)) => index_for_time(&lane.clips, time, Some(&moving.id)),
        (None, None) => {
            return Err(EngineError::MissingMoveTarget {
                clip_id: moving.id.clone(),
            });
        }
    };

    if target == location.index {
        debug!(clip_id = %moving.id, index = target, "move is a no-op");
        return Ok(());
    }

    let lane: &mut Lane = doc.lane_at_mut(location);
    let clip = lane.clips.remove(location.index);
    debug!(clip_id = %clip.id, from = location.index, to = target, "reorder accepted");
    lane.clips.insert(target, clip);
    repack(lane);
    Ok(())
}

/// Number of clips whose midpoint lies before `time`.
fn index_for_time(clips: &[crate::timeline::Clip], time: Tick, ignore: Option<&str>) -> usize {
    clips
        .iter()
        .filter(|clip| Some(clip.id.as_str()) != ignore)
        .filter(|clip| clip.start + clip.duration / 2 < time)
        .count()
}
