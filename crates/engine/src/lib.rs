//! UI-agnostic multitrack timeline editing engine.
//!
//! Documents are immutable values: every edit takes a [`TimelineDoc`] by
//! reference and returns a new one, so undo is a matter of keeping the old
//! value around. Track policies decide how each edit treats neighbouring
//! clips; the main track is magnetic and always gapless from tick 0.

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod invariants;
pub mod migrate;
pub mod ops;
pub mod policy;
pub mod snap;
pub mod store;
pub mod time;
pub mod timeline;

pub use api::{Command, Engine, EngineErrorEvent, EngineErrorKind, Event};
pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind, Result};
pub use export::{RenderAudioItem, RenderClip, RenderPlan, build_render_plan};
pub use history::{DEFAULT_HISTORY_DEPTH, EditCommand, EditOp, History};
pub use invariants::{
    ValidationReport, Violation, assert_invariants, normalize, validate, validate_linked_groups,
};
pub use migrate::{
    LegacySession, LegacyTimeline, LegacyTimelineClip, ensure_latest_format,
    migrate_session_to_timeline_doc, migrate_timeline_doc_to_session, repair_timeline,
};
pub use ops::{
    AddTrackOptions, DeleteOptions, InsertOptions, MoveClipsOptions, MoveOptions, SplitOptions,
    TrimInOptions, TrimOptions, TrimOutOptions, add_marker, add_track, delete_clip, insert_clip,
    move_clip, move_clips, remove_marker, remove_track, select_clips, set_playhead, split_clip,
    split_linked_group, trim_clip, trim_in, trim_out,
};
pub use policy::{AutoPack, EditMode, SilenceFill, TrackPolicy, TrackRole};
pub use snap::{
    DEFAULT_SNAP_THRESHOLD, SnapOptions, SnapPoint, SnapResult, SnapSource, SnapTargets,
    calculate_snap_points, default_snap_threshold, find_nearest_snap, snap_clip_drag, snap_drag,
};
pub use store::{DocumentStore, JsonFileStore, MemoryStore};
pub use time::{STANDARD_TIMEBASE, Tick, Timebase, rescale, seconds_to_ticks, ticks_to_seconds};
pub use timeline::{
    CURRENT_SCHEMA_VERSION, Clip, ClipId, ClipLocation, Lane, MAIN_TRACK_ID, Marker, MarkerKind,
    Selection, TimelineDoc, Track, TrackBody, TrackKind, create_empty_timeline,
};
