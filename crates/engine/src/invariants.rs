//! Structural rules every committed document satisfies.
//!
//! Lane rules are checked per track: clips sorted by start, no overlap unless
//! the track allows it, and on magnetic tracks exact adjacency starting at
//! tick 0. Exactly one main track must exist. Linked-group alignment is a
//! separate, on-demand check because edit sequences may leave a group
//! desynchronized until a final realignment step.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};

use tracing::error;

use crate::error::{EngineError, Result};
use crate::policy::TrackRole;
use crate::time::Tick;
use crate::timeline::{Clip, ClipId, GroupId, LaneId, TimelineDoc, TrackId};

/// One broken rule, naming the offending track and clips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MainTrackCount {
        count: usize,
    },
    NonPositiveDuration {
        clip_id: ClipId,
        duration: Tick,
    },
    NegativeSourceStart {
        clip_id: ClipId,
        src_start: Tick,
    },
    DuplicateClipId {
        clip_id: ClipId,
    },
    /// `start + duration` or `src_start + duration` leaves the tick range.
    TimeOverflow {
        clip_id: ClipId,
    },
    Unsorted {
        track_id: TrackId,
        lane_id: LaneId,
        first: ClipId,
        second: ClipId,
    },
    Overlap {
        track_id: TrackId,
        lane_id: LaneId,
        first: ClipId,
        second: ClipId,
        overlap: Tick,
    },
    Gap {
        track_id: TrackId,
        lane_id: LaneId,
        first: ClipId,
        second: ClipId,
        gap: Tick,
    },
    MagneticStart {
        track_id: TrackId,
        lane_id: LaneId,
        clip_id: ClipId,
        start: Tick,
    },
    LinkedGroupMismatch {
        group_id: GroupId,
        first: ClipId,
        second: ClipId,
    },
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MainTrackCount { count } => {
                write!(f, "expected exactly one main track, found {count}")
            }
            Self::NonPositiveDuration { clip_id, duration } => {
                write!(f, "clip {clip_id} has non-positive duration {duration}")
            }
            Self::NegativeSourceStart { clip_id, src_start } => {
                write!(f, "clip {clip_id} has negative source start {src_start}")
            }
            Self::DuplicateClipId { clip_id } => write!(f, "clip id {clip_id} appears twice"),
            Self::TimeOverflow { clip_id } => {
                write!(f, "clip {clip_id} ends outside the representable tick range")
            }
            Self::Unsorted {
                track_id,
                lane_id,
                first,
                second,
            } => write!(
                f,
                "lane {lane_id} on track {track_id} is unsorted: {first} starts after {second}"
            ),
            Self::Overlap {
                track_id,
                lane_id,
                first,
                second,
                overlap,
            } => write!(
                f,
                "clips {first} and {second} overlap by {overlap} ticks on lane {lane_id} of track {track_id}"
            ),
            Self::Gap {
                track_id,
                lane_id,
                first,
                second,
                gap,
            } => write!(
                f,
                "magnetic track {track_id} lane {lane_id} has a {gap} tick gap between {first} and {second}"
            ),
            Self::MagneticStart {
                track_id,
                lane_id,
                clip_id,
                start,
            } => write!(
                f,
                "magnetic track {track_id} lane {lane_id} starts with {clip_id} at {start} instead of 0"
            ),
            Self::LinkedGroupMismatch {
                group_id,
                first,
                second,
            } => write!(
                f,
                "linked group {group_id} is out of sync: {first} and {second} differ in start or duration"
            ),
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<Violation>,
}

/// Collects every rule violation in `doc` without failing.
pub fn validate(doc: &TimelineDoc) -> ValidationReport {
    let mut errors = Vec::new();

    let main_count = doc
        .tracks
        .iter()
        .filter(|track| track.role() == TrackRole::Main)
        .count();
    if main_count != 1 {
        errors.push(Violation::MainTrackCount { count: main_count });
    }

    let mut seen = HashSet::new();
    for clip in doc.clips() {
        if clip.duration <= 0 {
            errors.push(Violation::NonPositiveDuration {
                clip_id: clip.id.clone(),
                duration: clip.duration,
            });
        }
        if clip.src_start < 0 {
            errors.push(Violation::NegativeSourceStart {
                clip_id: clip.id.clone(),
                src_start: clip.src_start,
            });
        }
        if clip.start.checked_add(clip.duration).is_none()
            || clip.src_start.checked_add(clip.duration).is_none()
        {
            errors.push(Violation::TimeOverflow {
                clip_id: clip.id.clone(),
            });
        }
        if !seen.insert(clip.id.as_str()) {
            errors.push(Violation::DuplicateClipId {
                clip_id: clip.id.clone(),
            });
        }
    }

    for track in &doc.tracks {
        let magnetic = track.is_magnetic();
        let allow_overlap = track.allows_overlap();

        for lane in track.lanes() {
            if magnetic {
                if let Some(first) = lane.clips.first() {
                    if first.start != 0 {
                        errors.push(Violation::MagneticStart {
                            track_id: track.id.clone(),
                            lane_id: lane.id.clone(),
                            clip_id: first.id.clone(),
                            start: first.start,
                        });
                    }
                }
            }

            for pair in lane.clips.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if a.start > b.start {
                    errors.push(Violation::Unsorted {
                        track_id: track.id.clone(),
                        lane_id: lane.id.clone(),
                        first: a.id.clone(),
                        second: b.id.clone(),
                    });
                    continue;
                }
                if a.end() > b.start && !allow_overlap {
                    errors.push(Violation::Overlap {
                        track_id: track.id.clone(),
                        lane_id: lane.id.clone(),
                        first: a.id.clone(),
                        second: b.id.clone(),
                        overlap: a.end().saturating_sub(b.start),
                    });
                } else if magnetic && a.end() < b.start {
                    errors.push(Violation::Gap {
                        track_id: track.id.clone(),
                        lane_id: lane.id.clone(),
                        first: a.id.clone(),
                        second: b.id.clone(),
                        gap: b.start.saturating_sub(a.end()),
                    });
                }
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Fails with the first violation found in `doc`.
///
/// # Example
/// ```
/// use timeline_engine::{Timebase, assert_invariants, create_empty_timeline};
///
/// let doc = create_empty_timeline(Timebase::MILLIS);
/// assert!(assert_invariants(&doc).is_ok());
/// ```
pub fn assert_invariants(doc: &TimelineDoc) -> Result<()> {
    match validate(doc).errors.into_iter().next() {
        Some(violation) => Err(EngineError::InvariantViolation(violation)),
        None => Ok(()),
    }
}

/// Checks that clips sharing a linked group move and trim in lock-step.
///
/// Members are grouped per track; every track in a group must cover exactly
/// the same set of `(start, duration)` spans, so split halves stay aligned with
/// their counterparts.
pub fn validate_linked_groups(doc: &TimelineDoc) -> Vec<Violation> {
    let mut groups: BTreeMap<&str, BTreeMap<&str, Vec<&Clip>>> = BTreeMap::new();
    for track in &doc.tracks {
        for clip in track.lanes().iter().flat_map(|lane| lane.clips.iter()) {
            if let Some(group_id) = clip.linked_group_id.as_deref() {
                groups
                    .entry(group_id)
                    .or_default()
                    .entry(track.id.as_str())
                    .or_default()
                    .push(clip);
            }
        }
    }

    let mut errors = Vec::new();
    for (group_id, by_track) in groups {
        let mut tracks = by_track.into_values();
        let Some(mut anchor) = tracks.next() else {
            continue;
        };
        anchor.sort_by_key(|clip| (clip.start, clip.duration));

        for mut members in tracks {
            members.sort_by_key(|clip| (clip.start, clip.duration));
            let mismatch = (0..anchor.len().max(members.len())).find(|&i| {
                match (anchor.get(i), members.get(i)) {
                    (Some(a), Some(b)) => a.start != b.start || a.duration != b.duration,
                    _ => true,
                }
            });
            if let Some(i) = mismatch {
                let first = anchor.get(i).or(anchor.last());
                let second = members.get(i).or(members.last());
                if let (Some(first), Some(second)) = (first, second) {
                    errors.push(Violation::LinkedGroupMismatch {
                        group_id: group_id.to_owned(),
                        first: first.id.clone(),
                        second: second.id.clone(),
                    });
                }
            }
        }
    }
    errors
}

/// Stable-sorts every lane by start. Gaps and overlaps are left alone.
pub fn normalize(doc: &TimelineDoc) -> TimelineDoc {
    let mut out = doc.clone();
    for track in &mut out.tracks {
        for lane in track.lanes_mut() {
            lane.clips.sort_by_key(|clip| clip.start);
        }
    }
    out
}

/// Final gate of every edit operation.
///
/// A violation here is a defect in the operation that produced `doc`.
pub(crate) fn checked(doc: TimelineDoc, operation: &'static str) -> Result<TimelineDoc> {
    if let Err(err) = assert_invariants(&doc) {
        error!(operation, %err, "edit produced an invalid timeline");
        return Err(err);
    }
    Ok(doc)
}
