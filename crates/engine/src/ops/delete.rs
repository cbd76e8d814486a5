use tracing::{debug, warn};

use super::lane::repack;
use super::{ensure_unlocked, locate};
use crate::error::{EngineError, Result};
use crate::invariants::checked;
use crate::policy::EditMode;
use crate::timeline::{Clip, ClipId, TimelineDoc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOptions {
    pub clip_id: ClipId,
    pub mode: EditMode,
}

impl DeleteOptions {
    pub fn ripple(clip_id: impl Into<ClipId>) -> Self {
        Self {
            clip_id: clip_id.into(),
            mode: EditMode::Ripple,
        }
    }
}

/// Removes one clip from wherever it lives.
///
/// Magnetic tracks only accept ripple deletion: downstream clips move left by
/// the removed duration. Elsewhere the clip is lifted and a gap is left.
///
/// # Example
/// ```
/// use timeline_engine::{Clip, DeleteOptions, InsertOptions, Timebase};
/// use timeline_engine::{create_empty_timeline, delete_clip, insert_clip};
///
/// let mut doc = create_empty_timeline(Timebase::MILLIS);
/// for (id, duration) in [("a", 5_000), ("b", 3_000), ("c", 2_000)] {
///     let clip = Clip::new(id, "src.mp4", 0, duration);
///     doc = insert_clip(&doc, &InsertOptions::new("main", clip)).expect("insert");
/// }
///
/// let doc = delete_clip(&doc, &DeleteOptions::ripple("b")).expect("delete");
/// assert_eq!(doc.main_clips()[1].start, 5_000);
/// ```
pub fn delete_clip(doc: &TimelineDoc, options: &DeleteOptions) -> Result<TimelineDoc> {
    let mut out = doc.clone();
    let removed = remove_clip(&mut out, &options.clip_id, options.mode)?;
    out.selection.selected.remove(&removed.id);

    debug!(
        clip_id = %removed.id,
        removed_duration = removed.duration,
        mode = ?options.mode,
        "delete accepted"
    );
    checked(out, "delete")
}

/// Lifts a clip out of a working copy; shared with move.
pub(crate) fn remove_clip(doc: &mut TimelineDoc, clip_id: &str, mode: EditMode) -> Result<Clip> {
    let location = locate(doc, clip_id)?;
    ensure_unlocked(doc.clip_at(location))?;

    let track = &doc.tracks[location.track];
    let magnetic = track.is_magnetic();
    if magnetic && mode != EditMode::Ripple {
        warn!(clip_id, track_id = %track.id, "delete rejected: magnetic track requires ripple");
        return Err(EngineError::RippleRequired {
            track_id: track.id.clone(),
        });
    }

    let lane = doc.lane_at_mut(location);
    let removed = lane.clips.remove(location.index);
    if magnetic {
        for clip in lane.clips.iter_mut().skip(location.index) {
            clip.start -= removed.duration;
        }
        repack(lane);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::{DeleteOptions, delete_clip};
    use crate::error::EngineError;
    use crate::ops::fixtures::{main_doc, main_layout, with_overlay};
    use crate::ops::{AddTrackOptions, InsertOptions, add_track, insert_clip};
    use crate::policy::{EditMode, TrackRole};
    use crate::timeline::Clip;

    #[test]
    fn ripple_delete_on_main_closes_the_gap() {
        let doc = main_doc(&[("a", 5_000), ("b", 3_000), ("c", 2_000)]);
        assert_eq!(doc.main_clips()[2].start, 8_000);

        let doc = delete_clip(&doc, &DeleteOptions::ripple("b")).expect("delete");

        assert_eq!(
            main_layout(&doc),
            vec![("a".to_string(), 0, 5_000), ("c".to_string(), 5_000, 2_000)]
        );
    }

    #[test]
    fn overwrite_delete_on_main_is_a_policy_violation() {
        let doc = main_doc(&[("a", 5_000), ("b", 3_000)]);
        let options = DeleteOptions {
            clip_id: "a".into(),
            mode: EditMode::Overwrite,
        };
        assert!(matches!(
            delete_clip(&doc, &options),
            Err(EngineError::RippleRequired { .. })
        ));
    }

    #[test]
    fn overlay_delete_leaves_a_gap() {
        let doc = with_overlay(main_doc(&[]), &[("o1", 0, 100), ("o2", 100, 100)]);
        let options = DeleteOptions {
            clip_id: "o1".into(),
            mode: EditMode::Overwrite,
        };

        let doc = delete_clip(&doc, &options).expect("delete");
        let lane = &doc.track("overlay").expect("overlay").lanes()[0];
        assert_eq!(lane.clips.len(), 1);
        assert_eq!(lane.clips[0].start, 100);
    }

    #[test]
    fn delete_drops_clip_from_selection() {
        let mut doc = main_doc(&[("a", 100), ("b", 100)]);
        doc.selection.selected.insert("a".into());

        let doc = delete_clip(&doc, &DeleteOptions::ripple("a")).expect("delete");
        assert!(doc.selection.selected.is_empty());
    }

    #[test]
    fn unknown_clip_is_not_found() {
        let doc = main_doc(&[("a", 100)]);
        assert!(matches!(
            delete_clip(&doc, &DeleteOptions::ripple("zzz")),
            Err(EngineError::ClipNotFound { .. })
        ));
    }

    #[test]
    fn locked_clip_cannot_be_deleted() {
        let mut doc = main_doc(&[("a", 100)]);
        doc.tracks[0].lanes_mut()[0].clips[0].locked = true;
        assert!(matches!(
            delete_clip(&doc, &DeleteOptions::ripple("a")),
            Err(EngineError::ClipLocked { .. })
        ));
    }

    #[test]
    fn magnetic_overlay_ripples_like_main() {
        let mut doc = add_track(
            &main_doc(&[]),
            &AddTrackOptions::new("Titles", TrackRole::Overlay)
                .with_id("titles")
                .magnetic(),
        )
        .expect("add track");
        for (id, duration) in [("t1", 400), ("t2", 600), ("t3", 200)] {
            let clip = Clip::new(id, "src", 0, duration).at(5_000);
            doc = insert_clip(&doc, &InsertOptions::new("titles", clip)).expect("insert");
        }

        let overwrite = DeleteOptions {
            clip_id: "t1".into(),
            mode: EditMode::Overwrite,
        };
        assert!(matches!(
            delete_clip(&doc, &overwrite),
            Err(EngineError::RippleRequired { .. })
        ));

        let doc = delete_clip(&doc, &DeleteOptions::ripple("t1")).expect("delete");
        let lane = &doc.track("titles").expect("titles").lanes()[0];
        let layout: Vec<_> = lane
            .clips
            .iter()
            .map(|clip| (clip.id.as_str(), clip.start))
            .collect();
        assert_eq!(layout, [("t2", 0), ("t3", 600)]);
    }
}
