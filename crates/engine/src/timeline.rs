use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::policy::{TrackPolicy, TrackRole};
use crate::time::{Tick, Timebase};

/// Opaque identifier for timeline clips.
pub type ClipId = String;
/// Identifier of source media owned by the media library.
pub type SourceId = String;
pub type TrackId = String;
pub type LaneId = String;
pub type MarkerId = String;
/// Identifier shared by clips that move and trim together.
pub type GroupId = String;

/// Schema version stamped on multitrack documents.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Id of the main track in freshly created documents.
pub const MAIN_TRACK_ID: &str = "main";

/// An instance of source media placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: ClipId,
    pub source_id: SourceId,
    pub src_start: Tick,
    pub duration: Tick,
    pub start: Tick,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,
    /// Effect and transition metadata, carried through edits untouched.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub effects: serde_json::Value,
}

impl Clip {
    /// Creates an unlinked, unlocked clip at timeline position 0.
    pub fn new(
        id: impl Into<ClipId>,
        source_id: impl Into<SourceId>,
        src_start: Tick,
        duration: Tick,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            src_start,
            duration,
            start: 0,
            linked_group_id: None,
            locked: false,
            effects: serde_json::Value::Null,
        }
    }

    pub fn at(mut self, start: Tick) -> Self {
        self.start = start;
        self
    }

    pub fn linked(mut self, group_id: impl Into<GroupId>) -> Self {
        self.linked_group_id = Some(group_id.into());
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Exclusive timeline end, saturating at the tick range.
    pub fn end(&self) -> Tick {
        self.start.saturating_add(self.duration)
    }

    /// Exclusive source out-point.
    pub fn src_end(&self) -> Tick {
        self.src_start.saturating_add(self.duration)
    }

    /// Returns true when `[start, end)` intersects this clip.
    pub fn overlaps(&self, start: Tick, end: Tick) -> bool {
        self.start < end && start < self.end()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Ordered clip sequence; the collision domain of a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub id: LaneId,
    #[serde(default)]
    pub clips: Vec<Clip>,
}

impl Lane {
    pub fn new(id: impl Into<LaneId>) -> Self {
        Self {
            id: id.into(),
            clips: Vec::new(),
        }
    }

    /// End of the last clip, or 0 for an empty lane.
    pub fn end(&self) -> Tick {
        self.clips.iter().map(Clip::end).max().unwrap_or(0)
    }

    pub fn position(&self, clip_id: &str) -> Option<usize> {
        self.clips.iter().position(|clip| clip.id == clip_id)
    }

    /// First clip intersecting `[start, end)`, ignoring `ignore`.
    pub fn collision(&self, start: Tick, end: Tick, ignore: Option<&str>) -> Option<&Clip> {
        self.clips
            .iter()
            .filter(|clip| Some(clip.id.as_str()) != ignore)
            .find(|clip| clip.overlaps(start, end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// Role-specific lane layout of a track.
///
/// The main track holds exactly one lane by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum TrackBody {
    Main {
        lane: Lane,
    },
    Overlay {
        lanes: Vec<Lane>,
        #[serde(default)]
        magnetic: bool,
    },
    Audio {
        lanes: Vec<Lane>,
        #[serde(default)]
        magnetic: bool,
        #[serde(default, rename = "allowOverlap")]
        allow_overlap: bool,
    },
}

/// Named, typed, policy-governed collection of lanes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    #[serde(flatten)]
    pub body: TrackBody,
}

impl Track {
    pub fn main(id: impl Into<TrackId>, name: impl Into<String>, lane: Lane) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: TrackKind::Video,
            body: TrackBody::Main { lane },
        }
    }

    pub fn overlay(id: impl Into<TrackId>, name: impl Into<String>, lane: Lane) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: TrackKind::Video,
            body: TrackBody::Overlay {
                lanes: vec![lane],
                magnetic: false,
            },
        }
    }

    pub fn audio(id: impl Into<TrackId>, name: impl Into<String>, lane: Lane) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: TrackKind::Audio,
            body: TrackBody::Audio {
                lanes: vec![lane],
                magnetic: false,
                allow_overlap: false,
            },
        }
    }

    pub fn role(&self) -> TrackRole {
        match self.body {
            TrackBody::Main { .. } => TrackRole::Main,
            TrackBody::Overlay { .. } => TrackRole::Overlay,
            TrackBody::Audio { .. } => TrackRole::Audio,
        }
    }

    pub fn policy(&self) -> TrackPolicy {
        self.role().policy()
    }

    /// Main tracks and tracks flagged magnetic keep every lane gapless from 0.
    pub fn is_magnetic(&self) -> bool {
        match self.body {
            TrackBody::Main { .. } => true,
            TrackBody::Overlay { magnetic, .. } | TrackBody::Audio { magnetic, .. } => magnetic,
        }
    }

    pub fn allows_overlap(&self) -> bool {
        match self.body {
            TrackBody::Audio {
                allow_overlap,
                magnetic,
                ..
            } => allow_overlap && !magnetic,
            _ => self.policy().allow_overlap,
        }
    }

    pub fn lanes(&self) -> &[Lane] {
        match &self.body {
            TrackBody::Main { lane } => std::slice::from_ref(lane),
            TrackBody::Overlay { lanes, .. } | TrackBody::Audio { lanes, .. } => lanes,
        }
    }

    pub fn lanes_mut(&mut self) -> &mut [Lane] {
        match &mut self.body {
            TrackBody::Main { lane } => std::slice::from_mut(lane),
            TrackBody::Overlay { lanes, .. } | TrackBody::Audio { lanes, .. } => lanes,
        }
    }

    pub fn lane_index(&self, lane_id: &str) -> Option<usize> {
        self.lanes().iter().position(|lane| lane.id == lane_id)
    }

    /// Appends a lane and returns its index; the main track never grows lanes.
    pub(crate) fn open_lane(&mut self, lane: Lane) -> Option<usize> {
        match &mut self.body {
            TrackBody::Main { .. } => None,
            TrackBody::Overlay { lanes, .. } | TrackBody::Audio { lanes, .. } => {
                lanes.push(lane);
                Some(lanes.len() - 1)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Beat,
    User,
}

/// Labeled point in time, independent of tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub time: Tick,
    #[serde(default)]
    pub label: String,
    pub kind: MarkerKind,
}

/// Playhead and selected clips. Not subject to edit invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub playhead: Tick,
    #[serde(default)]
    pub selected: BTreeSet<ClipId>,
}

/// Position of a clip inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipLocation {
    pub track: usize,
    pub lane: usize,
    pub index: usize,
}

/// Aggregate root of an edited sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDoc {
    pub timebase: Timebase,
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub selection: Selection,
    pub version: u32,
    /// Counter behind ids minted by edit operations.
    #[serde(default)]
    pub next_id: u64,
}

/// Creates a document with one empty main track.
///
/// # Example
/// ```
/// use timeline_engine::{Timebase, create_empty_timeline};
///
/// let doc = create_empty_timeline(Timebase::MILLIS);
/// assert_eq!(doc.tracks.len(), 1);
/// assert_eq!(doc.duration(), 0);
/// ```
pub fn create_empty_timeline(timebase: Timebase) -> TimelineDoc {
    TimelineDoc {
        timebase,
        tracks: vec![Track::main(MAIN_TRACK_ID, "Main", Lane::new("main-0"))],
        markers: Vec::new(),
        selection: Selection::default(),
        version: CURRENT_SCHEMA_VERSION,
        next_id: 1,
    }
}

impl TimelineDoc {
    /// Returns the latest clip end over all tracks, in ticks.
    pub fn duration(&self) -> Tick {
        self.clips().map(Clip::end).max().unwrap_or(0)
    }

    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.tracks
            .iter()
            .flat_map(|track| track.lanes().iter())
            .flat_map(|lane| lane.clips.iter())
    }

    pub fn find_clip(&self, clip_id: &str) -> Option<ClipLocation> {
        self.tracks.iter().enumerate().find_map(|(track, t)| {
            t.lanes().iter().enumerate().find_map(|(lane, l)| {
                l.position(clip_id)
                    .map(|index| ClipLocation { track, lane, index })
            })
        })
    }

    pub fn clip(&self, clip_id: &str) -> Option<&Clip> {
        self.find_clip(clip_id).map(|location| self.clip_at(location))
    }

    pub fn clip_at(&self, location: ClipLocation) -> &Clip {
        &self.lane_at(location).clips[location.index]
    }

    pub fn lane_at(&self, location: ClipLocation) -> &Lane {
        &self.tracks[location.track].lanes()[location.lane]
    }

    pub(crate) fn lane_at_mut(&mut self, location: ClipLocation) -> &mut Lane {
        &mut self.tracks[location.track].lanes_mut()[location.lane]
    }

    pub fn track(&self, track_id: &str) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == track_id)
    }

    pub fn track_index(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|track| track.id == track_id)
    }

    pub fn main_track(&self) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|track| track.role() == TrackRole::Main)
    }

    /// Clips of the main lane in timeline order.
    pub fn main_clips(&self) -> &[Clip] {
        self.main_track()
            .map(|track| track.lanes()[0].clips.as_slice())
            .unwrap_or(&[])
    }

    /// Ids of every clip sharing `group_id`, in track/lane order.
    pub fn linked_group(&self, group_id: &str) -> Vec<ClipId> {
        self.clips()
            .filter(|clip| clip.linked_group_id.as_deref() == Some(group_id))
            .map(|clip| clip.id.clone())
            .collect()
    }

    /// Mints an id with `prefix` that no clip, lane, track or marker uses yet.
    pub(crate) fn allocate_id(&mut self, prefix: &str) -> String {
        loop {
            let candidate = format!("{prefix}-{}", self.next_id);
            self.next_id += 1;
            if !self.id_in_use(&candidate) {
                return candidate;
            }
        }
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.tracks.iter().any(|track| {
            track.id == id
                || track
                    .lanes()
                    .iter()
                    .any(|lane| lane.id == id || lane.position(id).is_some())
        }) || self.markers.iter().any(|marker| marker.id == id)
    }
}
