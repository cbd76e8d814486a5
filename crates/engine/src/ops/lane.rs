//! Lane-level primitives shared by the edit operations.

use crate::error::{EngineError, Result};
use crate::policy::AutoPack;
use crate::time::Tick;
use crate::timeline::{Clip, Lane, TimelineDoc, Track};

/// Rewrites every start as the running sum of the preceding durations.
pub(crate) fn repack(lane: &mut Lane) {
    let mut cursor = 0;
    for clip in &mut lane.clips {
        clip.start = cursor;
        cursor = cursor.saturating_add(clip.duration);
    }
}

/// Sorted insertion position for a clip starting at `start`.
pub(crate) fn insertion_index(lane: &Lane, start: Tick) -> usize {
    lane.clips.partition_point(|clip| clip.start <= start)
}

/// Removes the window `[start, end)` from every clip it touches.
///
/// Fully covered clips disappear, partially covered clips are truncated and a
/// clip straddling the whole window is cut in two around it. `keep` is never
/// carved. Locked clips refuse to be carved.
pub(crate) fn carve(
    doc: &mut TimelineDoc,
    track: usize,
    lane: usize,
    start: Tick,
    end: Tick,
    keep: Option<&str>,
) -> Result<()> {
    if start >= end {
        return Ok(());
    }

    let locked = doc.tracks[track].lanes()[lane]
        .clips
        .iter()
        .find(|clip| clip.locked && Some(clip.id.as_str()) != keep && clip.overlaps(start, end));
    if let Some(clip) = locked {
        return Err(EngineError::ClipLocked {
            clip_id: clip.id.clone(),
        });
    }

    let clips = std::mem::take(&mut doc.tracks[track].lanes_mut()[lane].clips);
    let mut carved = Vec::with_capacity(clips.len() + 1);
    let mut needs_id = Vec::new();

    for clip in clips {
        if Some(clip.id.as_str()) == keep || !clip.overlaps(start, end) {
            carved.push(clip);
            continue;
        }
        let head = start - clip.start;
        let tail = clip.end() - end;
        if head > 0 {
            carved.push(Clip {
                duration: head,
                ..clip.clone()
            });
        }
        if tail > 0 {
            let cut = end - clip.start;
            if head > 0 {
                needs_id.push(carved.len());
            }
            carved.push(Clip {
                start: end,
                src_start: clip.src_start + cut,
                duration: tail,
                ..clip
            });
        }
    }

    doc.tracks[track].lanes_mut()[lane].clips = carved;
    for index in needs_id {
        let id = doc.allocate_id("clip");
        doc.tracks[track].lanes_mut()[lane].clips[index].id = id;
    }
    doc.tracks[track].lanes_mut()[lane]
        .clips
        .sort_by_key(|clip| clip.start);
    Ok(())
}

/// Outcome of the auto-pack lane search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LaneChoice {
    Existing(usize),
    Open,
    Refuse,
}

/// Picks a lane for `[start, end)` by the track role's auto-pack strategy.
///
/// Roles without auto-pack refuse. In the policy table that is only the main
/// role, whose magnetic inserts never reach this search.
pub(crate) fn choose_lane(track: &Track, start: Tick, end: Tick) -> LaneChoice {
    let free = track
        .lanes()
        .iter()
        .enumerate()
        .filter(|(_, lane)| lane.collision(start, end, None).is_none());

    let choice = match track.policy().auto_pack {
        AutoPack::None => return LaneChoice::Refuse,
        AutoPack::FirstFit => free.map(|(index, _)| index).next(),
        AutoPack::BestFit => free
            .min_by_key(|(index, lane)| (slack(lane, start, end), *index))
            .map(|(index, _)| index),
    };
    choice.map_or(LaneChoice::Open, LaneChoice::Existing)
}

/// Free space left around `[start, end)` in a collision-free lane.
fn slack(lane: &Lane, start: Tick, end: Tick) -> Tick {
    let before = lane
        .clips
        .iter()
        .map(Clip::end)
        .filter(|clip_end| *clip_end <= start)
        .max()
        .unwrap_or(0);
    let after = lane
        .clips
        .iter()
        .map(|clip| clip.start)
        .filter(|clip_start| *clip_start >= end)
        .min();

    let lead = start - before;
    match after {
        Some(next) => lead.saturating_add(next - end),
        None => lead.saturating_add(Tick::MAX / 4),
    }
}
