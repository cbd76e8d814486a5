use tracing::{debug, warn};

use super::lane::insertion_index;
use super::locate;
use crate::error::{EngineError, Result};
use crate::invariants::checked;
use crate::time::Tick;
use crate::timeline::{Clip, ClipId, TimelineDoc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    pub clip_id: ClipId,
    pub at_time: Tick,
}

impl SplitOptions {
    pub fn new(clip_id: impl Into<ClipId>, at_time: Tick) -> Self {
        Self {
            clip_id: clip_id.into(),
            at_time,
        }
    }
}

/// Splits one clip into two freshly identified halves at `at_time`.
///
/// `at_time` must lie strictly inside the clip. The halves conserve the total
/// duration and cover contiguous source ranges.
///
/// # Example
/// ```
/// use timeline_engine::{Clip, InsertOptions, SplitOptions, Timebase};
/// use timeline_engine::{create_empty_timeline, insert_clip, split_clip};
///
/// let doc = create_empty_timeline(Timebase::MILLIS);
/// let doc = insert_clip(&doc, &InsertOptions::new("main", Clip::new("c", "a.mp4", 0, 10_000)))
///     .expect("insert");
///
/// let doc = split_clip(&doc, &SplitOptions::new("c", 4_000)).expect("split");
/// let clips = doc.main_clips();
/// assert_eq!((clips[0].duration, clips[1].start, clips[1].src_start), (4_000, 4_000, 4_000));
/// ```
pub fn split_clip(doc: &TimelineDoc, options: &SplitOptions) -> Result<TimelineDoc> {
    let mut out = doc.clone();
    split_in_place(&mut out, &options.clip_id, options.at_time)?;
    checked(out, "split")
}

/// Splits every clip sharing the target's linked group at the same time.
pub fn split_linked_group(doc: &TimelineDoc, options: &SplitOptions) -> Result<TimelineDoc> {
    let target = doc.clip_at(locate(doc, &options.clip_id)?);
    let members = match target.linked_group_id.as_deref() {
        Some(group_id) => doc.linked_group(group_id),
        None => vec![target.id.clone()],
    };

    let mut out = doc.clone();
    for clip_id in &members {
        split_in_place(&mut out, clip_id, options.at_time)?;
    }

    debug!(
        clip_id = %options.clip_id,
        at_time = options.at_time,
        member_count = members.len(),
        "linked group split accepted"
    );
    checked(out, "split_linked_group")
}

fn split_in_place(doc: &mut TimelineDoc, clip_id: &str, at_time: Tick) -> Result<(ClipId, ClipId)> {
    let location = locate(doc, clip_id)?;
    let current = doc.clip_at(location).clone();

    if at_time <= current.start || at_time >= current.end() {
        warn!(clip_id, at_time, "split rejected: point outside clip");
        return Err(EngineError::SplitOutOfBounds {
            clip_id: current.id.clone(),
            at_time,
            start: current.start,
            end: current.end(),
        });
    }

    let left_duration = at_time - current.start;
    let right_duration = current.duration - left_duration;
    let left_id = doc.allocate_id("clip");
    let right_id = doc.allocate_id("clip");

    let left = Clip {
        id: left_id.clone(),
        duration: left_duration,
        ..current.clone()
    };
    let right = Clip {
        id: right_id.clone(),
        start: at_time,
        src_start: current.src_start + left_duration,
        duration: right_duration,
        ..current.clone()
    };

    debug!(
        at_time,
        clip_id = %current.id,
        source_id = %current.source_id,
        %left_id,
        %right_id,
        left_duration,
        right_duration,
        "split accepted"
    );

    let lane = doc.lane_at_mut(location);
    lane.clips[location.index] = left;
    // On overlap lanes a later neighbour may start inside the split clip.
    let index = insertion_index(lane, at_time);
    lane.clips.insert(index, right);

    if doc.selection.selected.remove(&current.id) {
        doc.selection.selected.insert(left_id.clone());
        doc.selection.selected.insert(right_id.clone());
    }
    Ok((left_id, right_id))
}

#[cfg(test)]
mod tests {
    use super::{SplitOptions, split_clip, split_linked_group};
    use crate::error::EngineError;
    use crate::invariants::validate_linked_groups;
    use crate::ops::fixtures::{main_doc, with_overlapping_audio};
    use crate::timeline::{Clip, Lane, Track};

    #[test]
    fn split_conserves_duration_and_source_range() {
        let mut doc = main_doc(&[("c", 10_000)]);
        doc.tracks[0].lanes_mut()[0].clips[0].src_start = 250;

        let doc = split_clip(&doc, &SplitOptions::new("c", 4_000)).expect("split");

        let clips = doc.main_clips();
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].duration + clips[1].duration, 10_000);
        assert_eq!(clips[0].src_end(), clips[1].src_start);
        assert_eq!(clips[1].src_start, 4_250);
        assert!(clips.iter().all(|clip| clip.id != "c"));
    }

    #[test]
    fn split_at_clip_boundary_is_rejected() {
        let doc = main_doc(&[("a", 1_000), ("b", 1_000)]);

        for at_time in [0, 1_000, 2_000] {
            let result = split_clip(&doc, &SplitOptions::new("a", at_time));
            assert!(matches!(result, Err(EngineError::SplitOutOfBounds { .. })));
        }
    }

    #[test]
    fn halves_inherit_lock_group_and_selection() {
        let mut doc = main_doc(&[("c", 1_000)]);
        {
            let clip = &mut doc.tracks[0].lanes_mut()[0].clips[0];
            clip.locked = true;
            clip.linked_group_id = Some("g".into());
        }
        doc.selection.selected.insert("c".into());

        let doc = split_clip(&doc, &SplitOptions::new("c", 300)).expect("split");

        assert!(doc.main_clips().iter().all(|clip| clip.locked));
        assert!(
            doc.main_clips()
                .iter()
                .all(|clip| clip.linked_group_id.as_deref() == Some("g"))
        );
        assert_eq!(doc.selection.selected.len(), 2);
    }

    #[test]
    fn linked_group_splits_in_lock_step() {
        let mut doc = main_doc(&[("v", 2_000)]);
        doc.tracks[0].lanes_mut()[0].clips[0].linked_group_id = Some("g".into());
        let mut lane = Lane::new("a0");
        lane.clips.push(Clip::new("a", "src", 0, 2_000).linked("g"));
        doc.tracks.push(Track::audio("audio", "Audio", lane));

        let doc = split_linked_group(&doc, &SplitOptions::new("a", 800)).expect("split");

        assert_eq!(doc.main_clips().len(), 2);
        assert_eq!(doc.track("audio").expect("audio").lanes()[0].clips.len(), 2);
        assert_eq!(doc.linked_group("g").len(), 4);
        assert!(validate_linked_groups(&doc).is_empty());
    }

    #[test]
    fn split_on_overlap_lane_keeps_clips_sorted() {
        let doc = with_overlapping_audio(main_doc(&[]), &[("a", 0, 1_000), ("b", 200, 500)]);

        let doc = split_clip(&doc, &SplitOptions::new("a", 500)).expect("split");

        let lane = &doc.track("audio").expect("audio").lanes()[0];
        let starts: Vec<_> = lane.clips.iter().map(|clip| clip.start).collect();
        assert_eq!(starts, [0, 200, 500]);
        assert_eq!(lane.clips[1].id, "b");
        assert_eq!(lane.clips[2].duration, 500);
    }
}
