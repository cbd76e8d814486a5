//! Legacy session import/export and format detection.
//!
//! Version 1 sessions stored one flat list of clip instances timed in
//! seconds. They map onto the main track of a current document; anything the
//! flat shape cannot express (overlay and audio tracks) is dropped on the way
//! back.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::invariants::{assert_invariants, normalize};
use crate::ops::repack;
use crate::time::{Tick, Timebase, seconds_to_ticks, ticks_to_seconds};
use crate::timeline::{CURRENT_SCHEMA_VERSION, Clip, TimelineDoc, create_empty_timeline};

/// Version string written into downgraded sessions.
pub const LEGACY_SCHEMA_VERSION: &str = "1.0.0";

fn legacy_version() -> String {
    LEGACY_SCHEMA_VERSION.to_string()
}

fn default_zoom() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySession {
    #[serde(default = "legacy_version")]
    pub version: String,
    /// Media library entries; carried opaquely.
    #[serde(default)]
    pub clips: Vec<Value>,
    pub timeline: LegacyTimeline,
    #[serde(default = "default_zoom")]
    pub zoom_level: f64,
    #[serde(default)]
    pub playhead_position: f64,
    #[serde(default)]
    pub scroll_position: f64,
    #[serde(default)]
    pub last_modified: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyTimeline {
    #[serde(default)]
    pub clips: Vec<LegacyTimelineClip>,
    #[serde(default)]
    pub duration: f64,
}

/// One placed clip instance; all times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTimelineClip {
    pub instance_id: String,
    pub clip_id: String,
    pub in_point: f64,
    pub out_point: f64,
    pub start_time: f64,
}

/// Builds a current document from a v1 session.
///
/// Records with a non-positive length or a negative in-point are dropped.
/// Duplicate instance ids get fresh ids. A session whose packed length does
/// not fit the tick range is rejected. The main lane is repacked so the
/// result is gapless even when the session drifted.
pub fn migrate_session_to_timeline_doc(
    session: &LegacySession,
    timebase: Timebase,
) -> Result<TimelineDoc> {
    let mut doc = create_empty_timeline(timebase);
    let mut seen = HashSet::new();
    let mut clips = Vec::with_capacity(session.timeline.clips.len());
    let mut duplicates = Vec::new();

    let mut total: Tick = 0;
    for record in &session.timeline.clips {
        let src_start = seconds_to_ticks(record.in_point, timebase);
        if src_start < 0 {
            warn!(
                instance_id = %record.instance_id,
                in_point = record.in_point,
                "dropping legacy clip with negative in point"
            );
            continue;
        }
        let duration = seconds_to_ticks(record.out_point, timebase)
            .checked_sub(src_start)
            .unwrap_or(0);
        if duration <= 0 {
            warn!(
                instance_id = %record.instance_id,
                in_point = record.in_point,
                out_point = record.out_point,
                "dropping legacy clip with non-positive duration"
            );
            continue;
        }
        total = total.checked_add(duration).ok_or_else(|| {
            warn!(instance_id = %record.instance_id, "legacy timeline length overflows");
            EngineError::UnrecognizedFormat {
                reason: "legacy timeline length overflows the tick range".into(),
            }
        })?;

        if !seen.insert(record.instance_id.as_str()) {
            warn!(instance_id = %record.instance_id, "legacy clip id repeated; assigning a fresh id");
            duplicates.push(clips.len());
        }
        let start = seconds_to_ticks(record.start_time, timebase);
        clips.push(Clip::new(&record.instance_id, &record.clip_id, src_start, duration).at(start));
    }

    doc.tracks[0].lanes_mut()[0].clips = clips;
    for index in duplicates {
        let id = doc.allocate_id("clip");
        doc.tracks[0].lanes_mut()[0].clips[index].id = id;
    }

    let mut doc = repair_timeline(&doc);
    doc.selection.playhead = seconds_to_ticks(session.playhead_position, timebase).max(0);
    assert_invariants(&doc)?;

    info!(
        clip_count = doc.main_clips().len(),
        dropped = session.timeline.clips.len() - doc.main_clips().len(),
        ticks_per_second = timebase.ticks_per_second,
        "legacy session migrated"
    );
    Ok(doc)
}

/// Sorts every lane and re-chains magnetic lanes from zero.
pub fn repair_timeline(doc: &TimelineDoc) -> TimelineDoc {
    let mut out = normalize(doc);
    for track in &mut out.tracks {
        if !track.is_magnetic() {
            continue;
        }
        for lane in track.lanes_mut() {
            repack(lane);
        }
    }
    out
}

/// Writes the main track back out in the v1 shape.
pub fn migrate_timeline_doc_to_session(doc: &TimelineDoc) -> LegacySession {
    let timebase = doc.timebase;
    let main = doc.main_clips();
    let dropped = doc.clips().count() - main.len();
    if dropped > 0 {
        warn!(dropped, "clips outside the main track are not representable in a legacy session");
    }

    let sources: BTreeSet<&str> = main.iter().map(|clip| clip.source_id.as_str()).collect();
    let records = main
        .iter()
        .map(|clip| LegacyTimelineClip {
            instance_id: clip.id.clone(),
            clip_id: clip.source_id.clone(),
            in_point: ticks_to_seconds(clip.src_start, timebase),
            out_point: ticks_to_seconds(clip.src_end(), timebase),
            start_time: ticks_to_seconds(clip.start, timebase),
        })
        .collect();
    let end = main.last().map(Clip::end).unwrap_or(0);

    LegacySession {
        version: legacy_version(),
        clips: sources
            .into_iter()
            .map(|id| serde_json::json!({ "id": id }))
            .collect(),
        timeline: LegacyTimeline {
            clips: records,
            duration: ticks_to_seconds(end, timebase),
        },
        zoom_level: default_zoom(),
        playhead_position: ticks_to_seconds(doc.selection.playhead, timebase),
        scroll_position: 0.0,
        last_modified: Value::Null,
    }
}

/// Accepts any supported stored shape and returns a current document.
///
/// The flag is `true` when the input was a legacy session and had to be
/// migrated, so callers know to persist the upgraded form.
pub fn ensure_latest_format(raw: &Value, timebase: Timebase) -> Result<(TimelineDoc, bool)> {
    let Some(object) = raw.as_object() else {
        return Err(EngineError::UnrecognizedFormat {
            reason: "document root must be a JSON object".into(),
        });
    };

    if object.contains_key("timebase") && object.contains_key("tracks") {
        let version = object
            .get("version")
            .and_then(Value::as_u64)
            .unwrap_or(u64::from(CURRENT_SCHEMA_VERSION));
        if version > u64::from(CURRENT_SCHEMA_VERSION) {
            warn!(version, "document is newer than this engine");
            return Err(EngineError::UnsupportedVersion { version });
        }
        let mut doc: TimelineDoc = serde_json::from_value(raw.clone())
            .map_err(|source| EngineError::Deserialize { source })?;
        Timebase::new(doc.timebase.ticks_per_second)?;
        doc.version = CURRENT_SCHEMA_VERSION;
        let doc = normalize(&doc);
        assert_invariants(&doc)?;
        debug!(version, track_count = doc.tracks.len(), "document is current");
        return Ok((doc, false));
    }

    let legacy = raw
        .pointer("/timeline/clips")
        .is_some_and(Value::is_array);
    if legacy {
        let session: LegacySession = serde_json::from_value(raw.clone())
            .map_err(|source| EngineError::Deserialize { source })?;
        info!(from = %session.version, to = CURRENT_SCHEMA_VERSION, "migrating legacy session");
        let doc = migrate_session_to_timeline_doc(&session, timebase)?;
        return Ok((doc, true));
    }

    Err(EngineError::UnrecognizedFormat {
        reason: "expected a timeline document or a legacy session".into(),
    })
}
