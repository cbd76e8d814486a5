use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::export::{RenderPlan, build_render_plan};
use crate::history::{EditCommand, EditOp, History};
use crate::migrate::ensure_latest_format;
use crate::ops::{select_clips, set_playhead};
use crate::snap::{SnapResult, snap_drag};
use crate::store::DocumentStore;
use crate::time::Tick;
use crate::timeline::{ClipId, TimelineDoc, create_empty_timeline};

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Applies one edit as its own undo step.
    ///
    /// # Example
    /// ```
    /// use timeline_engine::{Clip, Command, EditOp, Engine, EngineConfig, InsertOptions, MemoryStore};
    ///
    /// let mut engine = Engine::new(EngineConfig::default(), MemoryStore::new()).expect("engine");
    /// let insert = InsertOptions::new("main", Clip::new("c1", "a.mp4", 0, 2_000));
    /// engine.handle_command(Command::Edit(EditOp::Insert(insert))).expect("insert");
    /// assert_eq!(engine.doc().duration(), 2_000);
    /// ```
    Edit(EditOp),
    /// Applies several edits as one undo step. Nothing changes if any fails.
    Batch {
        label: String,
        ops: Vec<EditOp>,
    },
    Undo,
    Redo,
    SetPlayhead {
        tick: Tick,
    },
    SelectClips {
        ids: Vec<ClipId>,
    },
    /// Replaces the document with an empty timeline and forgets history.
    Reset,
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DocumentChanged(TimelineDoc),
    PlayheadChanged { tick: Tick },
    SelectionChanged { ids: Vec<ClipId> },
    HistoryChanged { can_undo: bool, can_redo: bool },
    Error(EngineErrorEvent),
}

/// User-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    SplitOutOfBounds,
    ClipNotFound,
    ClipLocked,
    Policy,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::SplitOutOfBounds { .. } => Self::SplitOutOfBounds,
            EngineError::ClipNotFound { .. } => Self::ClipNotFound,
            EngineError::ClipLocked { .. } => Self::ClipLocked,
            EngineError::RippleRequired { .. }
            | EngineError::LaneCollision { .. }
            | EngineError::DuplicateMainTrack
            | EngineError::MainTrackImmutable { .. }
            | EngineError::OverlapNotAllowed { .. } => Self::Policy,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Owns the current document, its history and the store it persists to.
#[derive(Debug)]
pub struct Engine<S> {
    config: EngineConfig,
    store: S,
    doc: TimelineDoc,
    history: History,
}

impl<S> Engine<S>
where
    S: DocumentStore,
{
    /// Starts from an empty timeline without reading the store.
    pub fn new(config: EngineConfig, store: S) -> Result<Self> {
        let doc = create_empty_timeline(config.timebase()?);
        let history = History::new(config.history_depth);
        Ok(Self {
            config,
            store,
            doc,
            history,
        })
    }

    /// Loads the stored document, upgrading legacy sessions on the way.
    pub fn open(config: EngineConfig, mut store: S) -> Result<Self> {
        let timebase = config.timebase()?;
        let (doc, migrated) = match store.load()? {
            Some(raw) => ensure_latest_format(&raw, timebase)?,
            None => (create_empty_timeline(timebase), false),
        };
        let history = History::new(config.history_depth);
        let mut engine = Self {
            config,
            store,
            doc,
            history,
        };
        if migrated {
            info!("persisting upgraded document");
            engine.persist();
        }
        Ok(engine)
    }

    pub fn doc(&self) -> &TimelineDoc {
        &self.doc
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snaps a time against the current document using the configured targets.
    pub fn snap(&self, time: Tick) -> SnapResult {
        snap_drag(&self.doc, time, &self.config.snap_options())
    }

    pub fn render_plan(&self) -> Result<RenderPlan> {
        build_render_plan(&self.doc)
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::Edit(op) => self.execute(EditCommand::new(op)),
            Command::Batch { label, ops } => self.execute(EditCommand::batch(label, ops)),
            Command::Undo => {
                let restored = self.history.undo(&self.doc)?;
                Ok(self.restore(restored, "undo"))
            }
            Command::Redo => {
                let restored = self.history.redo(&self.doc)?;
                Ok(self.restore(restored, "redo"))
            }
            Command::SetPlayhead { tick } => {
                self.doc = set_playhead(&self.doc, tick);
                self.persist();
                Ok(vec![Event::PlayheadChanged {
                    tick: self.doc.selection.playhead,
                }])
            }
            Command::SelectClips { ids } => {
                self.doc = select_clips(&self.doc, &ids)?;
                self.persist();
                Ok(vec![Event::SelectionChanged {
                    ids: self.doc.selection.selected.iter().cloned().collect(),
                }])
            }
            Command::Reset => {
                self.doc = create_empty_timeline(self.doc.timebase);
                self.history.clear();
                self.persist();
                info!("timeline reset");
                Ok(vec![
                    Event::DocumentChanged(self.doc.clone()),
                    Event::PlayheadChanged { tick: 0 },
                    self.history_event(),
                ])
            }
        }
    }

    /// Like [`Engine::handle_command`], but reports failures as an event.
    pub fn dispatch(&mut self, command: Command) -> Vec<Event> {
        match self.handle_command(command) {
            Ok(events) => events,
            Err(error) => {
                warn!(%error, "command failed");
                vec![Event::Error(EngineErrorEvent::from_error(&error))]
            }
        }
    }

    fn execute(&mut self, command: EditCommand) -> Result<Vec<Event>> {
        let label = command.label().to_owned();
        let next = self.history.execute(&self.doc, command)?;
        self.doc = next;
        let mut events = self.commit();
        debug!(%label, clip_count = self.doc.clips().count(), "edit committed");
        events.push(self.history_event());
        Ok(events)
    }

    fn restore(&mut self, restored: Option<TimelineDoc>, action: &'static str) -> Vec<Event> {
        let Some(doc) = restored else {
            debug!(action, "nothing to apply");
            return Vec::new();
        };
        self.doc = doc;
        let mut events = self.commit();
        info!(action, "history step applied");
        events.push(self.history_event());
        events
    }

    /// Persists the current document and clamps a playhead left past the end.
    fn commit(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        let duration = self.doc.duration();
        if self.doc.selection.playhead > duration {
            self.doc = set_playhead(&self.doc, duration);
            events.push(Event::PlayheadChanged { tick: duration });
        }
        self.persist();
        events.insert(0, Event::DocumentChanged(self.doc.clone()));
        events
    }

    fn persist(&mut self) {
        if let Err(error) = self.store.persist(&self.doc) {
            warn!(%error, "failed to persist timeline document");
        }
    }

    fn history_event(&self) -> Event {
        Event::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }
}
