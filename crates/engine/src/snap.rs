//! Snap candidate collection and nearest-point search.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::time::{Tick, Timebase, rescale};
use crate::timeline::{ClipId, MarkerId, TimelineDoc};

/// Snap tolerance in milliseconds.
pub const DEFAULT_SNAP_THRESHOLD: Tick = 100;

/// Which kinds of points participate in snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapTargets {
    pub playhead: bool,
    pub clip_edges: bool,
    pub markers: bool,
    /// Whole seconds from 0 up to the document duration.
    pub grid: bool,
}

impl SnapTargets {
    pub const ALL: Self = Self {
        playhead: true,
        clip_edges: true,
        markers: true,
        grid: true,
    };

    pub const NONE: Self = Self {
        playhead: false,
        clip_edges: false,
        markers: false,
        grid: false,
    };

    /// Targets enabled in both sets.
    pub fn intersect(self, other: Self) -> Self {
        Self {
            playhead: self.playhead && other.playhead,
            clip_edges: self.clip_edges && other.clip_edges,
            markers: self.markers && other.markers,
            grid: self.grid && other.grid,
        }
    }
}

impl Default for SnapTargets {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SnapSource {
    Playhead,
    #[serde(rename_all = "camelCase")]
    ClipStart { clip_id: ClipId },
    #[serde(rename_all = "camelCase")]
    ClipEnd { clip_id: ClipId },
    #[serde(rename_all = "camelCase")]
    Marker { marker_id: MarkerId },
    Grid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapPoint {
    pub time: Tick,
    pub source: SnapSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapResult {
    /// Snapped time, or the input when nothing was in range.
    pub time: Tick,
    pub snapped: bool,
    pub distance: Tick,
    pub point: Option<SnapPoint>,
}

impl SnapResult {
    fn unsnapped(time: Tick) -> Self {
        Self {
            time,
            snapped: false,
            distance: 0,
            point: None,
        }
    }
}

/// Default tolerance expressed in the given timebase.
pub fn default_snap_threshold(timebase: Timebase) -> Tick {
    rescale(DEFAULT_SNAP_THRESHOLD, Timebase::MILLIS, timebase)
}

/// Collects candidate points sorted by time. Equal times keep collection order:
/// playhead, clip edges in track order, markers, grid.
pub fn calculate_snap_points(doc: &TimelineDoc, targets: SnapTargets) -> Vec<SnapPoint> {
    calculate_filtered(doc, targets, None)
}

fn calculate_filtered(
    doc: &TimelineDoc,
    targets: SnapTargets,
    exclude_clip: Option<&str>,
) -> Vec<SnapPoint> {
    let mut points = Vec::new();

    if targets.playhead {
        points.push(SnapPoint {
            time: doc.selection.playhead,
            source: SnapSource::Playhead,
        });
    }

    if targets.clip_edges {
        for clip in doc
            .clips()
            .filter(|clip| Some(clip.id.as_str()) != exclude_clip)
        {
            points.push(SnapPoint {
                time: clip.start,
                source: SnapSource::ClipStart {
                    clip_id: clip.id.clone(),
                },
            });
            points.push(SnapPoint {
                time: clip.end(),
                source: SnapSource::ClipEnd {
                    clip_id: clip.id.clone(),
                },
            });
        }
    }

    if targets.markers {
        points.extend(doc.markers.iter().map(|marker| SnapPoint {
            time: marker.time,
            source: SnapSource::Marker {
                marker_id: marker.id.clone(),
            },
        }));
    }

    if targets.grid {
        let step = doc.timebase.ticks_per_second.max(1);
        let duration = doc.duration();
        let mut time = 0;
        while time <= duration {
            points.push(SnapPoint {
                time,
                source: SnapSource::Grid,
            });
            time += step;
        }
    }

    points.sort_by_key(|point| point.time);
    points
}

/// Finds the point nearest to `time` within `threshold`.
///
/// `points` must be sorted by time. On a tie the earlier point wins, and among
/// points at the same time the first one listed.
pub fn find_nearest_snap(
    time: Tick,
    points: &[SnapPoint],
    threshold: Tick,
    disabled: bool,
) -> SnapResult {
    if disabled || points.is_empty() || threshold < 0 {
        return SnapResult::unsnapped(time);
    }

    let split = points.partition_point(|point| point.time < time);
    let after = points.get(split);
    // First point of the run sharing the closest earlier time.
    let before = split.checked_sub(1).map(|last| {
        let run_time = points[last].time;
        let first = points[..=last].partition_point(|point| point.time < run_time);
        &points[first]
    });

    let best = match (before, after) {
        (Some(before), Some(after)) => {
            if time - before.time <= after.time - time {
                before
            } else {
                after
            }
        }
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => return SnapResult::unsnapped(time),
    };

    let distance = (best.time - time).abs();
    if distance > threshold {
        return SnapResult::unsnapped(time);
    }
    SnapResult {
        time: best.time,
        snapped: true,
        distance,
        point: Some(best.clone()),
    }
}

/// Knobs for interactive snapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapOptions {
    pub targets: SnapTargets,
    pub threshold: Tick,
    pub disabled: bool,
    /// Clip whose own edges are ignored, usually the one being dragged.
    pub exclude_clip: Option<ClipId>,
}

impl SnapOptions {
    pub fn for_timebase(timebase: Timebase) -> Self {
        Self {
            targets: SnapTargets::ALL,
            threshold: default_snap_threshold(timebase),
            disabled: false,
            exclude_clip: None,
        }
    }

    /// Narrows the targets to those the track's role snaps to.
    pub fn for_track(&self, doc: &TimelineDoc, track_id: &str) -> Result<Self> {
        let track = doc
            .track(track_id)
            .ok_or_else(|| EngineError::track_not_found(track_id))?;
        Ok(Self {
            targets: self.targets.intersect(track.policy().snap_targets),
            ..self.clone()
        })
    }
}

/// Snaps a free time such as a playhead scrub or a split point.
pub fn snap_drag(doc: &TimelineDoc, time: Tick, options: &SnapOptions) -> SnapResult {
    let points = calculate_filtered(doc, options.targets, options.exclude_clip.as_deref());
    find_nearest_snap(time, &points, options.threshold, options.disabled)
}

/// Snaps a dragged clip by whichever of its edges lands closer to a point.
///
/// The returned time is the clip start that aligns the winning edge. The
/// dragged clip's own edges are never candidates, and only targets its track's
/// role snaps to are considered.
pub fn snap_clip_drag(
    doc: &TimelineDoc,
    clip_id: &str,
    proposed_start: Tick,
    options: &SnapOptions,
) -> Result<SnapResult> {
    let location = doc
        .find_clip(clip_id)
        .ok_or_else(|| EngineError::clip_not_found(clip_id))?;
    let clip = doc.clip_at(location);
    let targets = options
        .targets
        .intersect(doc.tracks[location.track].policy().snap_targets);
    let points = calculate_filtered(doc, targets, Some(clip_id));

    let by_start = find_nearest_snap(proposed_start, &points, options.threshold, options.disabled);
    let proposed_end = proposed_start + clip.duration;
    let by_end = find_nearest_snap(proposed_end, &points, options.threshold, options.disabled);

    let result = match (by_start.snapped, by_end.snapped) {
        (true, true) if by_end.distance < by_start.distance => SnapResult {
            time: by_end.time - clip.duration,
            ..by_end
        },
        (true, _) => by_start,
        (false, true) => SnapResult {
            time: by_end.time - clip.duration,
            ..by_end
        },
        (false, false) => SnapResult::unsnapped(proposed_start),
    };
    Ok(result)
}
