use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::invariants::assert_invariants;
use crate::policy::{SilenceFill, TrackRole};
use crate::time::{Tick, Timebase, ticks_to_seconds};
use crate::timeline::{Clip, ClipId, Lane, SourceId, TimelineDoc, TrackId};

/// Flattened, time-resolved description of what to render, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPlan {
    pub duration: f64,
    /// Distinct sources in first-use order.
    pub sources: Vec<SourceId>,
    pub video: Vec<RenderClip>,
    pub audio: Vec<RenderAudioItem>,
}

/// One visual clip. Layer 0 is the main track; overlay lanes stack above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderClip {
    pub clip_id: ClipId,
    pub source_id: SourceId,
    pub source_index: usize,
    pub track_id: TrackId,
    pub layer: usize,
    pub start: f64,
    pub in_point: f64,
    pub out_point: f64,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub effects: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RenderAudioItem {
    #[serde(rename_all = "camelCase")]
    Clip {
        clip_id: ClipId,
        source_id: SourceId,
        source_index: usize,
        track_id: TrackId,
        lane: usize,
        start: f64,
        in_point: f64,
        out_point: f64,
    },
    #[serde(rename_all = "camelCase")]
    Silence {
        track_id: TrackId,
        lane: usize,
        start: f64,
        duration: f64,
    },
}

/// Builds the render plan for a valid document.
///
/// # Example
/// ```
/// use timeline_engine::{Clip, InsertOptions, Timebase};
/// use timeline_engine::{build_render_plan, create_empty_timeline, insert_clip};
///
/// let doc = create_empty_timeline(Timebase::MILLIS);
/// let doc = insert_clip(&doc, &InsertOptions::new("main", Clip::new("c", "a.mp4", 500, 2_000)))
///     .expect("insert");
///
/// let plan = build_render_plan(&doc).expect("plan");
/// assert_eq!(plan.video[0].in_point, 0.5);
/// assert_eq!(plan.video[0].out_point, 2.5);
/// ```
pub fn build_render_plan(doc: &TimelineDoc) -> Result<RenderPlan> {
    assert_invariants(doc)?;

    let timebase = doc.timebase;
    let mut sources = Vec::<SourceId>::new();
    let mut video = Vec::new();
    let mut audio = Vec::new();

    let mut next_overlay_layer = 1;
    for track in &doc.tracks {
        match track.role() {
            TrackRole::Main | TrackRole::Overlay => {
                for lane in track.lanes() {
                    let layer = if track.role() == TrackRole::Main {
                        0
                    } else {
                        next_overlay_layer += 1;
                        next_overlay_layer - 1
                    };
                    for clip in &lane.clips {
                        let source_index = source_index(&mut sources, &clip.source_id);
                        video.push(RenderClip {
                            clip_id: clip.id.clone(),
                            source_id: clip.source_id.clone(),
                            source_index,
                            track_id: track.id.clone(),
                            layer,
                            start: ticks_to_seconds(clip.start, timebase),
                            in_point: ticks_to_seconds(clip.src_start, timebase),
                            out_point: ticks_to_seconds(clip.src_end(), timebase),
                            effects: clip.effects.clone(),
                        });
                    }
                }
            }
            TrackRole::Audio => {
                let fill = track.policy().silence_fill == SilenceFill::Explicit;
                for (index, lane) in track.lanes().iter().enumerate() {
                    flatten_audio_lane(
                        &mut audio,
                        &mut sources,
                        &track.id,
                        index,
                        lane,
                        fill,
                        timebase,
                    );
                }
            }
        }
    }

    video.sort_by(|a, b| {
        a.layer
            .cmp(&b.layer)
            .then(a.start.total_cmp(&b.start))
    });

    debug!(
        video_count = video.len(),
        audio_count = audio.len(),
        source_count = sources.len(),
        "render plan built"
    );
    Ok(RenderPlan {
        duration: ticks_to_seconds(doc.duration(), timebase),
        sources,
        video,
        audio,
    })
}

fn source_index(sources: &mut Vec<SourceId>, source_id: &str) -> usize {
    if let Some(index) = sources.iter().position(|known| known == source_id) {
        index
    } else {
        sources.push(source_id.to_owned());
        sources.len() - 1
    }
}

fn flatten_audio_lane(
    out: &mut Vec<RenderAudioItem>,
    sources: &mut Vec<SourceId>,
    track_id: &str,
    lane_index: usize,
    lane: &Lane,
    fill_silence: bool,
    timebase: Timebase,
) {
    let mut cursor: Tick = 0;
    for clip in &lane.clips {
        if fill_silence && clip.start > cursor {
            out.push(RenderAudioItem::Silence {
                track_id: track_id.to_owned(),
                lane: lane_index,
                start: ticks_to_seconds(cursor, timebase),
                duration: ticks_to_seconds(clip.start - cursor, timebase),
            });
        }
        out.push(audio_clip(sources, track_id, lane_index, clip, timebase));
        cursor = cursor.max(clip.end());
    }
}

fn audio_clip(
    sources: &mut Vec<SourceId>,
    track_id: &str,
    lane: usize,
    clip: &Clip,
    timebase: Timebase,
) -> RenderAudioItem {
    RenderAudioItem::Clip {
        clip_id: clip.id.clone(),
        source_id: clip.source_id.clone(),
        source_index: source_index(sources, &clip.source_id),
        track_id: track_id.to_owned(),
        lane,
        start: ticks_to_seconds(clip.start, timebase),
        in_point: ticks_to_seconds(clip.src_start, timebase),
        out_point: ticks_to_seconds(clip.src_end(), timebase),
    }
}
