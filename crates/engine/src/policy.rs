//! Fixed per-role editing policy.

use serde::{Deserialize, Serialize};

use crate::snap::SnapTargets;

/// How an edit treats neighbouring clips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Neighbours shift to absorb the change.
    #[default]
    Ripple,
    /// Neighbours are truncated or removed; deletions leave a gap.
    Overwrite,
}

/// Role of a track; selects its [`TrackPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackRole {
    Main,
    Overlay,
    Audio,
}

/// Lane selection strategy when a clip collides on a non-magnetic track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoPack {
    /// Collisions are errors.
    None,
    /// First collision-free lane in order.
    FirstFit,
    /// Collision-free lane leaving the tightest gap around the clip.
    BestFit,
}

/// How gaps on audio-like tracks are presented to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SilenceFill {
    /// Gaps are implicit.
    None,
    /// Gaps become explicit silence items.
    Explicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackPolicy {
    pub magnetic: bool,
    pub default_mode: EditMode,
    pub allow_overlap: bool,
    pub auto_pack: AutoPack,
    pub snap_targets: SnapTargets,
    pub silence_fill: SilenceFill,
}

impl TrackRole {
    pub const fn policy(self) -> TrackPolicy {
        match self {
            Self::Main => TrackPolicy {
                magnetic: true,
                default_mode: EditMode::Ripple,
                allow_overlap: false,
                auto_pack: AutoPack::None,
                snap_targets: SnapTargets::ALL,
                silence_fill: SilenceFill::None,
            },
            Self::Overlay => TrackPolicy {
                magnetic: false,
                default_mode: EditMode::Overwrite,
                allow_overlap: false,
                auto_pack: AutoPack::FirstFit,
                snap_targets: SnapTargets::ALL,
                silence_fill: SilenceFill::None,
            },
            Self::Audio => TrackPolicy {
                magnetic: false,
                default_mode: EditMode::Overwrite,
                allow_overlap: false,
                auto_pack: AutoPack::BestFit,
                snap_targets: SnapTargets {
                    playhead: true,
                    clip_edges: true,
                    markers: true,
                    grid: false,
                },
                silence_fill: SilenceFill::Explicit,
            },
        }
    }
}
