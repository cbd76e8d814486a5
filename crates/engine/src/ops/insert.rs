use tracing::{debug, warn};

use super::lane::{LaneChoice, carve, choose_lane, insertion_index, repack};
use super::validate_payload;
use crate::error::{EngineError, Result};
use crate::invariants::checked;
use crate::policy::EditMode;
use crate::timeline::{Clip, ClipLocation, Lane, LaneId, TimelineDoc, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOptions {
    pub track_id: TrackId,
    /// Target lane; the first lane when absent.
    pub lane_id: Option<LaneId>,
    pub clip: Clip,
    /// Position on magnetic lanes; appends when absent. Ignored elsewhere.
    pub at_index: Option<usize>,
    pub mode: EditMode,
}

impl InsertOptions {
    pub fn new(track_id: impl Into<TrackId>, clip: Clip) -> Self {
        Self {
            track_id: track_id.into(),
            lane_id: None,
            clip,
            at_index: None,
            mode: EditMode::Ripple,
        }
    }

    /// Options using the target track's default edit mode.
    pub fn for_track(doc: &TimelineDoc, track_id: impl Into<TrackId>, clip: Clip) -> Result<Self> {
        let track_id = track_id.into();
        let track = doc
            .track(&track_id)
            .ok_or_else(|| EngineError::track_not_found(&track_id))?;
        let mode = track.policy().default_mode;
        Ok(Self::new(track_id, clip).mode(mode))
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.at_index = Some(index);
        self
    }

    pub fn in_lane(mut self, lane_id: impl Into<LaneId>) -> Self {
        self.lane_id = Some(lane_id.into());
        self
    }

    pub fn mode(mut self, mode: EditMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Places a clip on a track according to the track's policy.
///
/// On magnetic tracks the start is derived from the target index; on other
/// tracks the clip keeps its own start and collisions are resolved by the
/// edit mode and the track's auto-pack strategy.
///
/// # Example
/// ```
/// use timeline_engine::{Clip, InsertOptions, Timebase, create_empty_timeline, insert_clip};
///
/// let doc = create_empty_timeline(Timebase::MILLIS);
/// let doc = insert_clip(&doc, &InsertOptions::new("main", Clip::new("c1", "a.mp4", 0, 5_000)))
///     .expect("insert");
/// let doc = insert_clip(&doc, &InsertOptions::new("main", Clip::new("c2", "b.mp4", 0, 3_000)))
///     .expect("insert");
/// assert_eq!(doc.main_clips()[1].start, 5_000);
/// ```
pub fn insert_clip(doc: &TimelineDoc, options: &InsertOptions) -> Result<TimelineDoc> {
    let mut out = doc.clone();
    let location = place_clip(&mut out, options)?;
    let placed = out.clip_at(location);

    debug!(
        clip_id = %placed.id,
        track_id = %options.track_id,
        lane = location.lane,
        index = location.index,
        start = placed.start,
        duration = placed.duration,
        mode = ?options.mode,
        "insert accepted"
    );
    checked(out, "insert")
}

/// Inserts into a working copy; shared with move.
pub(crate) fn place_clip(doc: &mut TimelineDoc, options: &InsertOptions) -> Result<ClipLocation> {
    validate_payload(&options.clip)?;
    if doc.find_clip(&options.clip.id).is_some() {
        warn!(clip_id = %options.clip.id, "insert rejected: duplicate clip id");
        return Err(EngineError::DuplicateClipId {
            clip_id: options.clip.id.clone(),
        });
    }

    let track = doc
        .track_index(&options.track_id)
        .ok_or_else(|| EngineError::track_not_found(&options.track_id))?;
    let lane = match &options.lane_id {
        Some(lane_id) => doc.tracks[track]
            .lane_index(lane_id)
            .ok_or_else(|| EngineError::LaneNotFound {
                track_id: options.track_id.clone(),
                lane_id: lane_id.clone(),
            })?,
        None => first_lane(doc, track),
    };

    if doc.tracks[track].is_magnetic() {
        insert_magnetic(doc, track, lane, options)
    } else {
        insert_free(doc, track, lane, options)
    }
}

fn first_lane(doc: &mut TimelineDoc, track: usize) -> usize {
    if doc.tracks[track].lanes().is_empty() {
        let lane_id = doc.allocate_id("lane");
        let _ = doc.tracks[track].open_lane(Lane::new(lane_id));
    }
    0
}

fn insert_magnetic(
    doc: &mut TimelineDoc,
    track: usize,
    lane: usize,
    options: &InsertOptions,
) -> Result<ClipLocation> {
    let clips = &doc.tracks[track].lanes()[lane].clips;
    let len = clips.len();
    let index = options.at_index.unwrap_or(len);
    if index > len {
        warn!(index, len, "insert rejected: index out of range");
        return Err(EngineError::IndexOutOfRange { index, len });
    }

    let start = match index {
        0 => 0,
        _ => clips[index - 1].end(),
    };
    let clip = Clip {
        start,
        ..options.clip.clone()
    };

    let index = match options.mode {
        EditMode::Ripple => index,
        EditMode::Overwrite => {
            carve(doc, track, lane, start, clip.end(), None)?;
            doc.tracks[track].lanes()[lane]
                .clips
                .partition_point(|existing| existing.start < start)
        }
    };

    let lane_ref = &mut doc.tracks[track].lanes_mut()[lane];
    lane_ref.clips.insert(index, clip);
    repack(lane_ref);
    Ok(ClipLocation { track, lane, index })
}

fn insert_free(
    doc: &mut TimelineDoc,
    track: usize,
    lane: usize,
    options: &InsertOptions,
) -> Result<ClipLocation> {
    let clip = &options.clip;
    if clip.start < 0 {
        return Err(EngineError::NegativeStart {
            clip_id: clip.id.clone(),
            start: clip.start,
        });
    }
    let (start, end) = (clip.start, clip.end());

    let collision = if doc.tracks[track].allows_overlap() {
        None
    } else {
        doc.tracks[track].lanes()[lane]
            .collision(start, end, None)
            .map(|existing| existing.id.clone())
    };

    let lane = match (collision, options.mode) {
        (None, _) => lane,
        (Some(_), EditMode::Overwrite) => {
            carve(doc, track, lane, start, end, None)?;
            lane
        }
        (Some(existing_id), EditMode::Ripple) => {
            match choose_lane(&doc.tracks[track], start, end) {
                LaneChoice::Existing(index) => index,
                LaneChoice::Open => {
                    let lane_id = doc.allocate_id("lane");
                    doc.tracks[track]
                        .open_lane(Lane::new(lane_id))
                        .ok_or_else(|| collision_error(doc, track, lane, clip, &existing_id))?
                }
                LaneChoice::Refuse => {
                    warn!(clip_id = %clip.id, %existing_id, "insert rejected: lane collision");
                    return Err(collision_error(doc, track, lane, clip, &existing_id));
                }
            }
        }
    };

    let lane_ref = &mut doc.tracks[track].lanes_mut()[lane];
    let index = insertion_index(lane_ref, start);
    lane_ref.clips.insert(index, clip.clone());
    Ok(ClipLocation { track, lane, index })
}

fn collision_error(
    doc: &TimelineDoc,
    track: usize,
    lane: usize,
    clip: &Clip,
    existing_id: &str,
) -> EngineError {
    EngineError::LaneCollision {
        track_id: doc.tracks[track].id.clone(),
        lane_id: doc.tracks[track].lanes()[lane].id.clone(),
        clip_id: clip.id.clone(),
        existing_id: existing_id.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::{InsertOptions, insert_clip};
    use crate::error::EngineError;
    use crate::ops::fixtures::{main_doc, main_layout, with_overlapping_audio, with_overlay};
    use crate::policy::EditMode;
    use crate::timeline::Clip;

    fn layout(entries: &[(&str, i64, i64)]) -> Vec<(String, i64, i64)> {
        entries
            .iter()
            .map(|(id, start, duration)| (id.to_string(), *start, *duration))
            .collect()
    }

    #[test]
    fn insert_at_index_ripples_downstream_clips() {
        let doc = main_doc(&[("c1", 5_000), ("c2", 3_000)]);
        let options = InsertOptions::new("main", Clip::new("c3", "src", 0, 2_000)).at_index(1);

        let doc = insert_clip(&doc, &options).expect("insert");

        assert_eq!(
            main_layout(&doc),
            layout(&[("c1", 0, 5_000), ("c3", 5_000, 2_000), ("c2", 7_000, 3_000)])
        );
    }

    #[test]
    fn magnetic_insert_ignores_caller_start() {
        let doc = main_doc(&[("c1", 1_000)]);
        let options = InsertOptions::new("main", Clip::new("c2", "src", 0, 500).at(9_999));

        let doc = insert_clip(&doc, &options).expect("insert");
        assert_eq!(doc.main_clips()[1].start, 1_000);
    }

    #[test]
    fn overwrite_insert_on_main_replaces_content_in_window() {
        let doc = main_doc(&[("c1", 1_000), ("c2", 1_000)]);
        let options = InsertOptions::new("main", Clip::new("n", "src", 0, 400))
            .at_index(1)
            .mode(EditMode::Overwrite);

        let doc = insert_clip(&doc, &options).expect("insert");

        let clips = doc.main_clips();
        assert_eq!(clips.len(), 3);
        assert_eq!((clips[1].id.as_str(), clips[1].start), ("n", 1_000));
        assert_eq!((clips[2].id.as_str(), clips[2].start), ("c2", 1_400));
        assert_eq!(clips[2].duration, 600);
        assert_eq!(clips[2].src_start, 400);
        assert_eq!(doc.duration(), 2_000);
    }

    #[test]
    fn index_past_end_is_rejected() {
        let doc = main_doc(&[("c1", 1_000)]);
        let options = InsertOptions::new("main", Clip::new("c2", "src", 0, 500)).at_index(3);

        let result = insert_clip(&doc, &options);
        assert!(matches!(
            result,
            Err(EngineError::IndexOutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        let doc = main_doc(&[]);
        let options = InsertOptions::new("main", Clip::new("c1", "src", 0, 0));
        assert!(matches!(
            insert_clip(&doc, &options),
            Err(EngineError::NonPositiveDuration { .. })
        ));
    }

    #[test]
    fn duplicate_clip_id_is_rejected() {
        let doc = main_doc(&[("c1", 1_000)]);
        let options = InsertOptions::new("main", Clip::new("c1", "src", 0, 500));
        assert!(matches!(
            insert_clip(&doc, &options),
            Err(EngineError::DuplicateClipId { .. })
        ));
    }

    #[test]
    fn overlay_collision_packs_into_a_new_lane() {
        let doc = with_overlay(main_doc(&[]), &[("o1", 1_000, 2_000)]);
        let options = InsertOptions::new("overlay", Clip::new("o2", "src", 0, 500).at(1_500));

        let doc = insert_clip(&doc, &options).expect("insert");

        let overlay = doc.track("overlay").expect("overlay track");
        assert_eq!(overlay.lanes().len(), 2);
        assert_eq!(overlay.lanes()[1].clips[0].id, "o2");
        assert_eq!(overlay.lanes()[1].clips[0].start, 1_500);
    }

    #[test]
    fn overlay_keeps_caller_start_and_leaves_gaps() {
        let doc = with_overlay(main_doc(&[]), &[("o1", 0, 100)]);
        let options = InsertOptions::new("overlay", Clip::new("o2", "src", 0, 100).at(700));

        let doc = insert_clip(&doc, &options).expect("insert");
        let lane = &doc.track("overlay").expect("overlay").lanes()[0];
        assert_eq!(lane.clips[1].start, 700);
    }

    #[test]
    fn overlay_overwrite_truncates_the_colliding_clip() {
        let doc = with_overlay(main_doc(&[]), &[("o1", 0, 1_000)]);
        let options = InsertOptions::new("overlay", Clip::new("o2", "src", 0, 500).at(800))
            .mode(EditMode::Overwrite);

        let doc = insert_clip(&doc, &options).expect("insert");
        let lane = &doc.track("overlay").expect("overlay").lanes()[0];
        assert_eq!(lane.clips.len(), 2);
        assert_eq!(lane.clips[0].duration, 800);
        assert_eq!(lane.clips[1].id, "o2");
    }

    #[test]
    fn failed_insert_leaves_input_untouched() {
        let doc = main_doc(&[("c1", 1_000)]);
        let before = doc.clone();
        let options = InsertOptions::new("missing", Clip::new("c2", "src", 0, 500));

        assert!(matches!(
            insert_clip(&doc, &options),
            Err(EngineError::TrackNotFound { .. })
        ));
        assert_eq!(doc, before);
    }

    #[test]
    fn overlap_lane_takes_colliding_clips_in_place() {
        let doc = with_overlapping_audio(main_doc(&[]), &[("a1", 0, 2_000)]);
        let options = InsertOptions::new("audio", Clip::new("a2", "src", 0, 1_000).at(500));

        let doc = insert_clip(&doc, &options).expect("insert");

        let audio = doc.track("audio").expect("audio");
        assert_eq!(audio.lanes().len(), 1);
        let ids: Vec<_> = audio.lanes()[0].clips.iter().map(|clip| clip.id.as_str()).collect();
        assert_eq!(ids, ["a1", "a2"]);
        assert_eq!(audio.lanes()[0].clips[0].duration, 2_000);
    }

    #[test]
    fn track_default_mode_drives_the_insert() {
        let doc = with_overlay(main_doc(&[("m", 1_000)]), &[("o1", 0, 1_000)]);

        let on_main = InsertOptions::for_track(&doc, "main", Clip::new("m2", "src", 0, 500))
            .expect("main");
        assert_eq!(on_main.mode, EditMode::Ripple);

        let on_overlay =
            InsertOptions::for_track(&doc, "overlay", Clip::new("o2", "src", 0, 500).at(800))
                .expect("overlay");
        assert_eq!(on_overlay.mode, EditMode::Overwrite);
        let doc = insert_clip(&doc, &on_overlay).expect("insert");
        let overlay = doc.track("overlay").expect("overlay");
        assert_eq!(overlay.lanes().len(), 1);
        assert_eq!(overlay.lanes()[0].clips[0].duration, 800);

        assert!(matches!(
            InsertOptions::for_track(&doc, "missing", Clip::new("x", "src", 0, 1)),
            Err(EngineError::TrackNotFound { .. })
        ));
    }
}
