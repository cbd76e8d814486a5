//! Snapshot-based undo/redo over the edit algebra.
//!
//! Each executed command keeps the document it was applied to. Undo hands
//! that snapshot back; redo re-applies the command's operation to whatever
//! document is current, so a redo never replays a stale result.

use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::ops::{
    AddTrackOptions, DeleteOptions, InsertOptions, MoveClipsOptions, MoveOptions, SplitOptions,
    TrimInOptions, TrimOptions, TrimOutOptions, add_marker, add_track, delete_clip, insert_clip,
    move_clip, move_clips, remove_marker, remove_track, split_clip, split_linked_group, trim_clip,
    trim_in, trim_out,
};
use crate::timeline::{Marker, MarkerId, TimelineDoc, TrackId};

pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// One invocation of an edit operation, with its options.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    Insert(InsertOptions),
    Delete(DeleteOptions),
    Split(SplitOptions),
    SplitLinkedGroup(SplitOptions),
    Trim(TrimOptions),
    TrimIn(TrimInOptions),
    TrimOut(TrimOutOptions),
    Move(MoveOptions),
    MoveClips(MoveClipsOptions),
    AddTrack(AddTrackOptions),
    RemoveTrack { track_id: TrackId },
    AddMarker(Marker),
    RemoveMarker { marker_id: MarkerId },
}

impl EditOp {
    pub fn apply(&self, doc: &TimelineDoc) -> Result<TimelineDoc> {
        match self {
            Self::Insert(options) => insert_clip(doc, options),
            Self::Delete(options) => delete_clip(doc, options),
            Self::Split(options) => split_clip(doc, options),
            Self::SplitLinkedGroup(options) => split_linked_group(doc, options),
            Self::Trim(options) => trim_clip(doc, options),
            Self::TrimIn(options) => trim_in(doc, options),
            Self::TrimOut(options) => trim_out(doc, options),
            Self::Move(options) => move_clip(doc, options),
            Self::MoveClips(options) => move_clips(doc, options),
            Self::AddTrack(options) => add_track(doc, options),
            Self::RemoveTrack { track_id } => remove_track(doc, track_id),
            Self::AddMarker(marker) => add_marker(doc, marker.clone()),
            Self::RemoveMarker { marker_id } => remove_marker(doc, marker_id),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Insert(options) => format!("Insert clip {}", options.clip.id),
            Self::Delete(options) => format!("Delete clip {}", options.clip_id),
            Self::Split(options) => format!("Split clip {}", options.clip_id),
            Self::SplitLinkedGroup(options) => format!("Split linked clips at {}", options.at_time),
            Self::Trim(options) => format!("Trim clip {}", options.clip_id),
            Self::TrimIn(options) => format!("Trim start of clip {}", options.clip_id),
            Self::TrimOut(options) => format!("Trim end of clip {}", options.clip_id),
            Self::Move(options) => format!("Move clip {}", options.clip_id),
            Self::MoveClips(options) => format!("Move {} clips", options.clip_ids.len()),
            Self::AddTrack(options) => format!("Add track {}", options.name),
            Self::RemoveTrack { track_id } => format!("Remove track {track_id}"),
            Self::AddMarker(marker) => format!("Add marker at {}", marker.time),
            Self::RemoveMarker { marker_id } => format!("Remove marker {marker_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CommandBody {
    Single(EditOp),
    Batch(Vec<EditCommand>),
}

/// One undo unit: a single operation or an ordered batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EditCommand {
    label: String,
    body: CommandBody,
    /// Document the command was last applied to.
    before: Option<TimelineDoc>,
}

impl EditCommand {
    pub fn new(op: EditOp) -> Self {
        Self {
            label: op.label(),
            body: CommandBody::Single(op),
            before: None,
        }
    }

    pub fn batch(label: impl Into<String>, ops: impl IntoIterator<Item = EditOp>) -> Self {
        Self {
            label: label.into(),
            body: CommandBody::Batch(ops.into_iter().map(Self::new).collect()),
            before: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_applied(&self) -> bool {
        self.before.is_some()
    }

    /// Applies the command to `doc`. A failing batch child aborts the whole
    /// batch and nothing is recorded.
    pub fn execute(&mut self, doc: &TimelineDoc) -> Result<TimelineDoc> {
        let next = match &mut self.body {
            CommandBody::Single(op) => op.apply(doc)?,
            CommandBody::Batch(children) => {
                let mut current = doc.clone();
                let mut failure = None;
                for child in children.iter_mut() {
                    match child.execute(&current) {
                        Ok(next) => current = next,
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                if let Some(err) = failure {
                    children.iter_mut().for_each(Self::forget);
                    warn!(label = %self.label, %err, "batch aborted");
                    return Err(err);
                }
                current
            }
        };
        self.before = Some(doc.clone());
        Ok(next)
    }

    /// Returns the document as it was before the last execution.
    pub fn undo(&mut self, current: &TimelineDoc) -> Result<TimelineDoc> {
        if self.before.is_none() {
            return Err(EngineError::CommandNotApplied {
                label: self.label.clone(),
            });
        }
        let restored = match &mut self.body {
            CommandBody::Single(_) => self.before.take(),
            CommandBody::Batch(children) => {
                let mut doc = current.clone();
                for child in children.iter_mut().rev() {
                    doc = child.undo(&doc)?;
                }
                self.before.take();
                Some(doc)
            }
        };
        restored.ok_or_else(|| EngineError::CommandNotApplied {
            label: self.label.clone(),
        })
    }

    fn forget(&mut self) {
        self.before = None;
        if let CommandBody::Batch(children) = &mut self.body {
            children.iter_mut().for_each(Self::forget);
        }
    }
}

/// Undo and redo stacks with a depth cap.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<EditCommand>,
    redo_stack: Vec<EditCommand>,
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// Runs `command` against `doc` and records it. The redo stack is
    /// discarded. On failure both stacks stay as they were.
    pub fn execute(&mut self, doc: &TimelineDoc, mut command: EditCommand) -> Result<TimelineDoc> {
        let next = command.execute(doc)?;
        self.redo_stack.clear();
        info!(label = %command.label, "command applied");
        self.undo_stack.push(command);
        while self.undo_stack.len() > self.max_depth {
            let dropped = self.undo_stack.remove(0);
            debug!(label = %dropped.label, "oldest history entry dropped");
        }
        Ok(next)
    }

    /// Returns the previous document, or `None` when there is nothing to undo.
    pub fn undo(&mut self, current: &TimelineDoc) -> Result<Option<TimelineDoc>> {
        let Some(mut command) = self.undo_stack.pop() else {
            return Ok(None);
        };
        match command.undo(current) {
            Ok(previous) => {
                debug!(
                    label = %command.label,
                    undo_remaining = self.undo_stack.len(),
                    "undo"
                );
                self.redo_stack.push(command);
                Ok(Some(previous))
            }
            Err(err) => {
                self.undo_stack.push(command);
                Err(err)
            }
        }
    }

    /// Re-applies the most recently undone command to `current`.
    pub fn redo(&mut self, current: &TimelineDoc) -> Result<Option<TimelineDoc>> {
        let Some(mut command) = self.redo_stack.pop() else {
            return Ok(None);
        };
        match command.execute(current) {
            Ok(next) => {
                debug!(
                    label = %command.label,
                    redo_remaining = self.redo_stack.len(),
                    "redo"
                );
                self.undo_stack.push(command);
                Ok(Some(next))
            }
            Err(err) => {
                warn!(label = %command.label, %err, "redo failed");
                self.redo_stack.push(command);
                Err(err)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.last().map(EditCommand::label)
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(EditCommand::label)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{EditCommand, EditOp, History};
    use crate::error::EngineError;
    use crate::ops::fixtures::main_doc;
    use crate::ops::{DeleteOptions, InsertOptions, SplitOptions};
    use crate::timeline::Clip;

    fn insert(id: &str, duration: i64) -> EditOp {
        EditOp::Insert(InsertOptions::new("main", Clip::new(id, "src", 0, duration)))
    }

    #[test]
    fn undo_restores_the_exact_prior_document() {
        let doc = main_doc(&[("a", 1_000), ("b", 500)]);
        let mut history = History::default();

        let edited = history
            .execute(&doc, EditCommand::new(EditOp::Split(SplitOptions::new("a", 400))))
            .expect("execute");
        assert_ne!(edited, doc);

        let restored = history.undo(&edited).expect("undo").expect("entry");
        assert_eq!(restored, doc);
        assert!(history.can_redo());
        assert_eq!(history.redo_label(), Some("Split clip a"));
    }

    #[test]
    fn redo_reapplies_the_operation() {
        let doc = main_doc(&[("a", 1_000)]);
        let mut history = History::default();

        let edited = history
            .execute(&doc, EditCommand::new(insert("b", 200)))
            .expect("execute");
        let undone = history.undo(&edited).expect("undo").expect("entry");
        let redone = history.redo(&undone).expect("redo").expect("entry");

        assert_eq!(redone, edited);
        assert!(!history.can_redo());
    }

    #[test]
    fn new_command_clears_redo() {
        let doc = main_doc(&[("a", 1_000)]);
        let mut history = History::default();
        let edited = history
            .execute(&doc, EditCommand::new(insert("b", 200)))
            .expect("execute");
        let undone = history.undo(&edited).expect("undo").expect("entry");

        history
            .execute(&undone, EditCommand::new(insert("c", 300)))
            .expect("execute");
        assert!(!history.can_redo());
    }

    #[test]
    fn failed_execute_leaves_stacks_untouched() {
        let doc = main_doc(&[("a", 1_000)]);
        let mut history = History::default();
        let edited = history
            .execute(&doc, EditCommand::new(insert("b", 200)))
            .expect("execute");

        let result = history.execute(&edited, EditCommand::new(insert("bad", 0)));
        assert!(matches!(result, Err(EngineError::NonPositiveDuration { .. })));
        assert_eq!(history.undo_label(), Some("Insert clip b"));
    }

    #[test]
    fn depth_cap_drops_oldest_entries() {
        let mut doc = main_doc(&[]);
        let mut history = History::new(2);
        for id in ["a", "b", "c"] {
            doc = history
                .execute(&doc, EditCommand::new(insert(id, 100)))
                .expect("execute");
        }

        let doc = history.undo(&doc).expect("undo").expect("entry");
        let doc = history.undo(&doc).expect("undo").expect("entry");
        assert_eq!(doc.main_clips().len(), 1);
        assert!(history.undo(&doc).expect("undo").is_none());
    }

    #[test]
    fn failing_batch_child_aborts_the_whole_batch() {
        let doc = main_doc(&[("a", 1_000)]);
        let mut history = History::default();
        let batch = EditCommand::batch(
            "Insert and delete",
            [insert("b", 200), EditOp::Delete(DeleteOptions::ripple("missing"))],
        );

        assert!(history.execute(&doc, batch).is_err());
        assert!(!history.can_undo());
    }

    #[test]
    fn batch_undo_returns_to_the_start() {
        let doc = main_doc(&[("a", 1_000)]);
        let mut history = History::default();
        let batch = EditCommand::batch(
            "Insert two",
            [insert("b", 200), insert("c", 300)],
        );

        let edited = history.execute(&doc, batch).expect("execute");
        assert_eq!(edited.main_clips().len(), 3);

        let restored = history.undo(&edited).expect("undo").expect("entry");
        assert_eq!(restored, doc);
    }

    #[test]
    fn undoing_an_unexecuted_command_is_an_error() {
        let doc = main_doc(&[]);
        let mut command = EditCommand::new(insert("a", 100));
        assert!(matches!(
            command.undo(&doc),
            Err(EngineError::CommandNotApplied { .. })
        ));
    }
}
