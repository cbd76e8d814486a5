use serde_json::json;
use timeline_engine::{
    AddTrackOptions, Clip, DeleteOptions, EditCommand, EditOp, EditMode, History, InsertOptions,
    MoveOptions, SplitOptions, Timebase, TimelineDoc, TrackRole, add_track, assert_invariants,
    create_empty_timeline, delete_clip, ensure_latest_format, insert_clip, move_clip, split_clip,
};

fn layout(doc: &TimelineDoc) -> Vec<(&str, i64, i64)> {
    doc.main_clips()
        .iter()
        .map(|clip| (clip.id.as_str(), clip.start, clip.end()))
        .collect()
}

fn main_with(clips: &[(&str, i64)]) -> TimelineDoc {
    let mut doc = create_empty_timeline(Timebase::MILLIS);
    for (id, duration) in clips {
        let clip = Clip::new(*id, format!("{id}.mp4"), 0, *duration);
        doc = insert_clip(&doc, &InsertOptions::new("main", clip)).expect("insert");
    }
    doc
}

#[test]
fn inserting_in_the_middle_ripples_the_tail() {
    let doc = main_with(&[("c1", 5_000)]);
    assert_eq!(layout(&doc), [("c1", 0, 5_000)]);

    let doc = insert_clip(
        &doc,
        &InsertOptions::new("main", Clip::new("c2", "c2.mp4", 0, 3_000)),
    )
    .expect("insert c2");
    assert_eq!(doc.main_clips()[1].start, 5_000);

    let doc = insert_clip(
        &doc,
        &InsertOptions::new("main", Clip::new("c3", "c3.mp4", 0, 2_000)).at_index(1),
    )
    .expect("insert c3");

    assert_eq!(
        layout(&doc),
        [("c1", 0, 5_000), ("c3", 5_000, 7_000), ("c2", 7_000, 10_000)]
    );
}

#[test]
fn ripple_delete_pulls_the_tail_left() {
    let doc = main_with(&[("a", 5_000), ("b", 3_000), ("c", 2_000)]);
    assert_eq!(doc.main_clips()[2].start, 8_000);

    let doc = delete_clip(&doc, &DeleteOptions::ripple("b")).expect("delete");

    assert_eq!(layout(&doc), [("a", 0, 5_000), ("c", 5_000, 7_000)]);
}

#[test]
fn split_produces_contiguous_segments() {
    let doc = main_with(&[("c", 10_000)]);

    let doc = split_clip(&doc, &SplitOptions::new("c", 4_000)).expect("split");

    let clips = doc.main_clips();
    assert_eq!(
        (clips[0].start, clips[0].duration, clips[0].src_start),
        (0, 4_000, 0)
    );
    assert_eq!(
        (clips[1].start, clips[1].duration, clips[1].src_start),
        (4_000, 6_000, 4_000)
    );
}

#[test]
fn legacy_session_migrates_to_a_packed_main_track() {
    let raw = json!({
        "version": "1.0.0",
        "clips": [],
        "timeline": {
            "clips": [
                { "instanceId": "i1", "clipId": "m1", "inPoint": 0, "outPoint": 5, "startTime": 0 },
                { "instanceId": "i2", "clipId": "m2", "inPoint": 1, "outPoint": 4, "startTime": 5 }
            ],
            "duration": 8
        },
        "zoomLevel": 1,
        "playheadPosition": 0,
        "scrollPosition": 0
    });

    let (doc, migrated) = ensure_latest_format(&raw, Timebase::MILLIS).expect("migrate");

    assert!(migrated);
    let durations: Vec<_> = doc.main_clips().iter().map(|clip| clip.duration).collect();
    assert_eq!(durations, [5_000, 3_000]);
    assert_eq!(doc.main_clips()[1].start, 5_000);
    assert!(assert_invariants(&doc).is_ok());
}

#[test]
fn undo_after_each_kind_of_edit_restores_the_document() {
    let doc = main_with(&[("a", 1_000), ("b", 2_000), ("c", 500)]);
    let ops = [
        EditOp::Split(SplitOptions::new("b", 1_800)),
        EditOp::Delete(DeleteOptions::ripple("a")),
        EditOp::Move(MoveOptions::to_index("c", 0)),
        EditOp::Insert(InsertOptions::new("main", Clip::new("d", "d.mp4", 0, 250)).at_index(2)),
    ];

    for op in ops {
        let mut history = History::default();
        let edited = history
            .execute(&doc, EditCommand::new(op.clone()))
            .expect("execute");
        assert_ne!(edited, doc, "{} should change the document", op.label());

        let restored = history.undo(&edited).expect("undo").expect("entry");
        assert_eq!(restored, doc, "undo of {} should be exact", op.label());
    }
}

#[test]
fn moving_to_another_track_matches_delete_then_insert() {
    let doc = main_with(&[("a", 1_000), ("b", 2_000), ("c", 500)]);
    let doc = add_track(
        &doc,
        &AddTrackOptions::new("Overlay", TrackRole::Overlay).with_id("overlay"),
    )
    .expect("add track");

    let moved = move_clip(
        &doc,
        &MoveOptions::to_time("b", 4_000).on_track("overlay"),
    )
    .expect("move");

    let mut payload = doc.clip("b").expect("b").clone();
    let removed = delete_clip(&doc, &DeleteOptions::ripple("b")).expect("delete");
    payload.start = 4_000;
    let inserted = insert_clip(
        &removed,
        &InsertOptions::new("overlay", payload).mode(EditMode::Ripple),
    )
    .expect("insert");

    assert_eq!(moved, inserted);
    assert_eq!(layout(&moved), [("a", 0, 1_000), ("c", 1_000, 1_500)]);
}
