//! Track, marker and selection housekeeping.

use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::invariants::checked;
use crate::policy::TrackRole;
use crate::time::Tick;
use crate::timeline::{ClipId, Lane, Marker, TimelineDoc, Track, TrackBody, TrackId, TrackKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTrackOptions {
    /// Allocated when absent.
    pub id: Option<TrackId>,
    pub name: String,
    pub role: TrackRole,
    /// Defaults to audio for the audio role and video otherwise.
    pub kind: Option<TrackKind>,
    /// Keeps every lane gapless from 0. Ignored for the main role.
    pub magnetic: bool,
    /// Lets clips in one lane overlap. Audio role only; loses to `magnetic`.
    pub allow_overlap: bool,
}

impl AddTrackOptions {
    pub fn new(name: impl Into<String>, role: TrackRole) -> Self {
        Self {
            id: None,
            name: name.into(),
            role,
            kind: None,
            magnetic: false,
            allow_overlap: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<TrackId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn magnetic(mut self) -> Self {
        self.magnetic = true;
        self
    }

    pub fn allow_overlap(mut self) -> Self {
        self.allow_overlap = true;
        self
    }
}

/// Appends an empty track with one lane. A main track goes first.
pub fn add_track(doc: &TimelineDoc, options: &AddTrackOptions) -> Result<TimelineDoc> {
    if options.role == TrackRole::Main && doc.main_track().is_some() {
        warn!(name = %options.name, "add track rejected: main track exists");
        return Err(EngineError::DuplicateMainTrack);
    }
    if options.allow_overlap && options.role != TrackRole::Audio {
        warn!(
            name = %options.name,
            role = ?options.role,
            "add track rejected: overlap needs an audio track"
        );
        return Err(EngineError::OverlapNotAllowed { role: options.role });
    }
    if let Some(id) = &options.id {
        if doc.track(id).is_some() {
            return Err(EngineError::DuplicateTrackId {
                track_id: id.clone(),
            });
        }
    }

    let mut out = doc.clone();
    let id = match &options.id {
        Some(id) => id.clone(),
        None => out.allocate_id("track"),
    };
    let lane = Lane::new(out.allocate_id("lane"));
    let kind = options.kind.unwrap_or(match options.role {
        TrackRole::Audio => TrackKind::Audio,
        TrackRole::Main | TrackRole::Overlay => TrackKind::Video,
    });
    let body = match options.role {
        TrackRole::Main => TrackBody::Main { lane },
        TrackRole::Overlay => TrackBody::Overlay {
            lanes: vec![lane],
            magnetic: options.magnetic,
        },
        TrackRole::Audio => TrackBody::Audio {
            lanes: vec![lane],
            magnetic: options.magnetic,
            allow_overlap: options.allow_overlap,
        },
    };
    let track = Track {
        id: id.clone(),
        name: options.name.clone(),
        kind,
        body,
    };

    if options.role == TrackRole::Main {
        out.tracks.insert(0, track);
    } else {
        out.tracks.push(track);
    }

    debug!(
        track_id = %id,
        role = ?options.role,
        magnetic = options.magnetic,
        allow_overlap = options.allow_overlap,
        "track added"
    );
    checked(out, "add_track")
}

/// Drops a non-main track together with its clips.
pub fn remove_track(doc: &TimelineDoc, track_id: &str) -> Result<TimelineDoc> {
    let index = doc
        .track_index(track_id)
        .ok_or_else(|| EngineError::track_not_found(track_id))?;
    if doc.tracks[index].role() == TrackRole::Main {
        warn!(track_id, "remove track rejected: main track");
        return Err(EngineError::MainTrackImmutable {
            track_id: track_id.to_string(),
        });
    }

    let mut out = doc.clone();
    let removed = out.tracks.remove(index);
    let mut clip_count = 0;
    for lane in removed.lanes() {
        for clip in &lane.clips {
            out.selection.selected.remove(&clip.id);
            clip_count += 1;
        }
    }

    debug!(track_id, clip_count, "track removed");
    checked(out, "remove_track")
}

/// Adds a marker, keeping markers ordered by time. An empty id is allocated.
pub fn add_marker(doc: &TimelineDoc, marker: Marker) -> Result<TimelineDoc> {
    if marker.time < 0 {
        return Err(EngineError::NegativeTime { time: marker.time });
    }

    let mut out = doc.clone();
    let mut marker = marker;
    if marker.id.is_empty() {
        marker.id = out.allocate_id("marker");
    } else if out.markers.iter().any(|existing| existing.id == marker.id) {
        return Err(EngineError::DuplicateMarkerId {
            marker_id: marker.id,
        });
    }

    let index = out
        .markers
        .partition_point(|existing| existing.time <= marker.time);
    debug!(marker_id = %marker.id, time = marker.time, kind = ?marker.kind, "marker added");
    out.markers.insert(index, marker);
    checked(out, "add_marker")
}

pub fn remove_marker(doc: &TimelineDoc, marker_id: &str) -> Result<TimelineDoc> {
    let index = doc
        .markers
        .iter()
        .position(|marker| marker.id == marker_id)
        .ok_or_else(|| EngineError::MarkerNotFound {
            marker_id: marker_id.to_string(),
        })?;

    let mut out = doc.clone();
    out.markers.remove(index);
    debug!(marker_id, "marker removed");
    checked(out, "remove_marker")
}

/// Moves the playhead, clamped to `[0, duration]`.
pub fn set_playhead(doc: &TimelineDoc, tick: Tick) -> TimelineDoc {
    let mut out = doc.clone();
    out.selection.playhead = tick.clamp(0, doc.duration());
    out
}

/// Replaces the selection. Every id must name a clip in the document.
pub fn select_clips(doc: &TimelineDoc, clip_ids: &[ClipId]) -> Result<TimelineDoc> {
    if let Some(missing) = clip_ids.iter().find(|id| doc.find_clip(id).is_none()) {
        return Err(EngineError::clip_not_found(missing));
    }
    let mut out = doc.clone();
    out.selection.selected = clip_ids.iter().cloned().collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{
        AddTrackOptions, add_marker, add_track, remove_marker, remove_track, select_clips,
        set_playhead,
    };
    use crate::error::EngineError;
    use crate::ops::fixtures::{main_doc, with_overlay};
    use crate::policy::TrackRole;
    use crate::timeline::{Marker, MarkerKind, TrackKind};

    fn marker(id: &str, time: i64) -> Marker {
        Marker {
            id: id.into(),
            time,
            label: String::new(),
            kind: MarkerKind::User,
        }
    }

    #[test]
    fn added_tracks_get_fresh_ids_and_a_lane() {
        let doc = main_doc(&[]);

        let doc = add_track(&doc, &AddTrackOptions::new("Music", TrackRole::Audio)).expect("add");

        let track = doc.tracks.last().expect("track");
        assert_eq!(track.kind, TrackKind::Audio);
        assert_eq!(track.lanes().len(), 1);
        assert!(track.id.starts_with("track-"));
    }

    #[test]
    fn track_flags_reach_the_new_track() {
        let doc = main_doc(&[]);
        let doc = add_track(
            &doc,
            &AddTrackOptions::new("Stems", TrackRole::Audio)
                .with_id("stems")
                .allow_overlap(),
        )
        .expect("add audio");
        let doc = add_track(
            &doc,
            &AddTrackOptions::new("Titles", TrackRole::Overlay)
                .with_id("titles")
                .magnetic(),
        )
        .expect("add overlay");

        let stems = doc.track("stems").expect("stems");
        assert!(stems.allows_overlap());
        assert!(!stems.is_magnetic());
        let titles = doc.track("titles").expect("titles");
        assert!(titles.is_magnetic());
        assert!(!titles.allows_overlap());
    }

    #[test]
    fn overlap_is_only_offered_to_audio_tracks() {
        let doc = main_doc(&[]);
        let options = AddTrackOptions::new("Titles", TrackRole::Overlay).allow_overlap();
        assert!(matches!(
            add_track(&doc, &options),
            Err(EngineError::OverlapNotAllowed {
                role: TrackRole::Overlay
            })
        ));
    }

    #[test]
    fn second_main_track_is_rejected() {
        let doc = main_doc(&[]);
        assert!(matches!(
            add_track(&doc, &AddTrackOptions::new("Main 2", TrackRole::Main)),
            Err(EngineError::DuplicateMainTrack)
        ));
    }

    #[test]
    fn duplicate_track_id_is_rejected() {
        let doc = main_doc(&[]);
        let options = AddTrackOptions::new("Other", TrackRole::Overlay).with_id("main");
        assert!(matches!(
            add_track(&doc, &options),
            Err(EngineError::DuplicateTrackId { .. })
        ));
    }

    #[test]
    fn main_track_cannot_be_removed() {
        let doc = main_doc(&[]);
        assert!(matches!(
            remove_track(&doc, "main"),
            Err(EngineError::MainTrackImmutable { .. })
        ));
    }

    #[test]
    fn removing_a_track_drops_its_clips_from_selection() {
        let mut doc = with_overlay(main_doc(&[]), &[("o", 0, 100)]);
        doc.selection.selected.insert("o".into());

        let doc = remove_track(&doc, "overlay").expect("remove");

        assert_eq!(doc.tracks.len(), 1);
        assert!(doc.selection.selected.is_empty());
    }

    #[test]
    fn markers_stay_sorted_and_get_ids() {
        let doc = main_doc(&[]);
        let doc = add_marker(&doc, marker("late", 900)).expect("add");
        let doc = add_marker(&doc, marker("", 100)).expect("add");

        assert_eq!(doc.markers[0].time, 100);
        assert!(doc.markers[0].id.starts_with("marker-"));

        let doc = remove_marker(&doc, "late").expect("remove");
        assert_eq!(doc.markers.len(), 1);
        assert!(matches!(
            remove_marker(&doc, "late"),
            Err(EngineError::MarkerNotFound { .. })
        ));
    }

    #[test]
    fn negative_marker_time_is_rejected() {
        let doc = main_doc(&[]);
        assert!(matches!(
            add_marker(&doc, marker("m", -1)),
            Err(EngineError::NegativeTime { .. })
        ));
    }

    #[test]
    fn playhead_is_clamped_to_duration() {
        let doc = main_doc(&[("a", 1_000)]);
        assert_eq!(set_playhead(&doc, 5_000).selection.playhead, 1_000);
        assert_eq!(set_playhead(&doc, -5).selection.playhead, 0);
    }

    #[test]
    fn selecting_unknown_clip_fails() {
        let doc = main_doc(&[("a", 1_000)]);
        assert!(select_clips(&doc, &["a".into()]).is_ok());
        assert!(matches!(
            select_clips(&doc, &["nope".into()]),
            Err(EngineError::ClipNotFound { .. })
        ));
    }
}
