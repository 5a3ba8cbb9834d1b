//! Integration tests for the editor crate

use sop_editor::{
    apply_drop, compute_pages, group_pages, BlockContent, BlockType, DocumentState, DropTarget,
    EditSession, EditorConfig, FileDraftStore, HeightTable, History, HistoryMode, IdGenerator,
    ManualClock, MeasurementProvider, MemoryDraftStore, Mutation, PageGeometry, Paginator,
    ResizeGesture, Row, RowId,
};
use std::collections::BTreeMap;

fn text_rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| {
            Row::single(
                format!("row{}", i + 1),
                sop_editor::Block::empty(format!("block{}", i + 1), BlockType::Text),
            )
        })
        .collect()
}

fn session(clock: &ManualClock) -> EditSession {
    EditSession::new(
        EditorConfig::default(),
        Box::new(clock.clone()),
        Box::new(MemoryDraftStore::new()),
    )
}

#[test]
fn test_three_rows_paginate_into_two_pages() {
    let rows = text_rows(3);
    let table = HeightTable::new()
        .with_row("row1", 300.0)
        .with_row("row2", 400.0)
        .with_row("row3", 500.0);

    let layout = compute_pages(&rows, |id| table.row_height(id), |_| 900.0);
    let row_ids: Vec<RowId> = rows.iter().map(|r| r.id.clone()).collect();

    assert_eq!(
        group_pages(&row_ids, &layout.break_set()),
        vec![
            vec!["row1".to_string(), "row2".to_string()],
            vec!["row3".to_string()]
        ]
    );
}

#[test]
fn test_recompute_is_idempotent() {
    let mut state = DocumentState::empty();
    state.rows = text_rows(12);

    let mut paginator = Paginator::new(PageGeometry::flat(700.0), 120);
    let mut table = HeightTable::new();
    for (i, row) in state.rows.iter().enumerate() {
        table.set_row(row.id.clone(), 90.0 + (i as f64 * 37.0) % 250.0);
    }
    paginator.measure(&table, &state, 0);

    let first = paginator.settle(&state).clone();
    let second = paginator.settle(&state).clone();
    assert_eq!(first, second);
    assert!(first.page_count() > 1);
}

#[test]
fn test_signature_footer_pushes_rows_to_next_page() {
    let config = EditorConfig {
        page: PageGeometry {
            page_height_px: 1000.0,
            margin_top_px: 0.0,
            margin_bottom_px: 0.0,
            header_height_px: 0.0,
            footer_heights_px: BTreeMap::from([
                ("standard".to_string(), 0.0),
                ("signature".to_string(), 200.0),
            ]),
            default_footer_variant: "standard".to_string(),
        },
        ..EditorConfig::default()
    };
    let clock = ManualClock::new(0);
    let mut session = EditSession::new(
        config,
        Box::new(clock.clone()),
        Box::new(MemoryDraftStore::new()),
    );

    session.observe_row_height("row-title", 450.0);
    session.observe_row_height("row-definition", 450.0);
    assert_eq!(session.export_pages().page_count(), 1);

    session
        .apply(
            Mutation::SetFooterVariant {
                page: 1,
                variant: Some("signature".into()),
            },
            HistoryMode::Push,
        )
        .unwrap();
    let layout = session.export_pages();
    assert_eq!(layout.page_count(), 2);
    assert_eq!(layout.breaks, vec!["row-definition".to_string()]);
    assert_eq!(session.page_breaks(), ["row-definition".to_string()]);
}

#[test]
fn test_layout_recompute_is_debounced() {
    let clock = ManualClock::new(0);
    let mut session = session(&clock);
    session.tick();
    clock.advance(1000);
    session.tick();

    for (i, h) in [100.0, 200.0, 300.0].into_iter().enumerate() {
        clock.advance(50);
        session.observe_row_height("row-title", h + i as f64);
        assert!(!session.tick().layout_updated);
    }
    clock.advance(120);
    assert!(session.tick().layout_updated);
    assert!(session.layout_settled());
}

#[test]
fn test_deleting_everything_synthesizes_content_box() {
    let mut ids = IdGenerator::new("doc");
    let mut state = DocumentState::empty();
    state.rows = text_rows(2);

    for id in ["block1", "block2"] {
        state = sop_editor::delete_block(&state, &mut ids, id).unwrap().unwrap();
    }
    assert_eq!(state.rows.len(), 1);
    assert_eq!(state.rows[0].blocks[0].block_type, BlockType::ContentBox);
}

#[test]
fn test_history_keeps_fifty_most_recent() {
    let mut history = History::new(0);
    for i in 1..=60 {
        history.set_value(HistoryMode::Push, i);
    }
    assert_eq!(history.undo_levels(), 50);
    let past: Vec<i32> = history.past().copied().collect();
    assert_eq!(past, (10..60).collect::<Vec<_>>());
}

#[test]
fn test_sixty_edits_drop_the_oldest() {
    let clock = ManualClock::new(0);
    let mut session = session(&clock);

    for i in 1..=60 {
        session
            .update_block("block-title", BlockContent::Text(format!("edit {}", i)))
            .unwrap();
    }
    assert!(session.can_undo());
    assert_eq!(session.history().undo_levels(), 50);

    let mut undone = 0;
    while session.undo() {
        undone += 1;
    }
    assert_eq!(undone, 50);
    assert_eq!(
        session.state().block("block-title").unwrap().content,
        BlockContent::Text("edit 10".into())
    );
}

#[test]
fn test_undo_then_redo_restores() {
    let clock = ManualClock::new(0);
    let mut session = session(&clock);
    session.add_block(BlockType::Text, None, None).unwrap();
    session.add_block(BlockType::Divider, None, None).unwrap();
    session.sort_content_boxes().unwrap();
    let latest = session.state().clone();

    for k in 1..=3 {
        for _ in 0..k {
            assert!(session.undo());
        }
        let before_redo_target = latest.clone();
        for _ in 0..k {
            assert!(session.redo());
        }
        assert_eq!(session.state(), &before_redo_target);
    }
}

#[test]
fn test_replace_does_not_grow_history() {
    let mut history = History::new("a".to_string());
    history.set_value(HistoryMode::Push, "b".to_string());
    history.set_value(HistoryMode::Push, "c".to_string());
    history.undo();

    for i in 0..20 {
        history.set_value(HistoryMode::Replace, format!("r{}", i));
    }
    assert_eq!(history.undo_levels(), 1);
    assert_eq!(history.redo_levels(), 1);
    assert_eq!(history.present(), "r19");
}

#[test]
fn test_drag_out_of_pair_onto_single_row() {
    let mut ids = IdGenerator::new("doc");
    let mut rows = text_rows(3);
    let moved = rows.remove(1).blocks.remove(0);
    rows[0].blocks.push(moved);
    // rows: row1 [block1, block2], row3 [block3]

    let outcome = apply_drop(&rows, "block2", &DropTarget::MergeLeft("row3".into()), &mut ids)
        .unwrap()
        .unwrap();

    let source = &outcome.rows[0];
    assert_eq!(source.id, "row1");
    assert_eq!(source.blocks.len(), 1);
    assert_eq!(source.blocks[0].id, "block1");

    let target = &outcome.rows[1];
    assert_eq!(target.id, "row3");
    let order: Vec<&str> = target.blocks.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(order, ["block2", "block3"]);
}

#[test]
fn test_resize_delta_is_clamped() {
    let gesture = ResizeGesture::new("row", 0.0, 0.5, 1000.0);
    let ratio = gesture.ratio_at(400.0);
    assert!((ratio - 0.6666).abs() < 1e-3);
    assert!(ratio <= 2.0 / 3.0);
}

#[test]
fn test_json_round_trip_through_session() {
    let clock = ManualClock::new(1_700_000_000_000);
    let mut session = session(&clock);
    session.add_block(BlockType::Table, Some("block-title"), None).unwrap();
    session
        .add_block(BlockType::ContentBox, None, Some("therapy"))
        .unwrap();
    session
        .apply(
            Mutation::SetSignature {
                page: 1,
                data: Some(serde_json::json!({ "signedBy": "Dr. B" })),
            },
            HistoryMode::Push,
        )
        .unwrap();

    let exported = session.export_json().unwrap();
    let original = session.state().clone();

    let mut other = EditSession::new(
        EditorConfig::default(),
        Box::new(clock.clone()),
        Box::new(MemoryDraftStore::new()),
    );
    other.import_json(&exported).unwrap();
    assert_eq!(other.state(), &original);
}

#[test]
fn test_import_defaults_missing_column_ratio() {
    let clock = ManualClock::new(0);
    let mut session = session(&clock);
    session
        .import_json(
            r#"{
                "headerTitle": "Import",
                "rows": [
                    { "id": "a", "blocks": [ { "id": "x", "type": "text", "content": "1" },
                                             { "id": "y", "type": "text", "content": "2" } ] }
                ]
            }"#,
        )
        .unwrap();
    assert_eq!(session.state().rows[0].column_ratio, 0.5);
    assert_eq!(session.state().header_title, "Import");
}

#[test]
fn test_draft_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(0);

    let mut first = EditSession::new(
        EditorConfig::default(),
        Box::new(clock.clone()),
        Box::new(FileDraftStore::new(dir.path())),
    );
    let id = first.add_block(BlockType::List, None, None).unwrap();
    clock.advance(1000);
    assert!(first.tick().draft_saved);
    drop(first);

    let mut second = EditSession::new(
        EditorConfig::default(),
        Box::new(clock.clone()),
        Box::new(FileDraftStore::new(dir.path())),
    );
    assert!(second.state().block(&id).is_some());

    // New ids must not collide with recovered ones
    let fresh = second.add_block(BlockType::Text, None, None).unwrap();
    assert_ne!(fresh, id);

    second.reset();
    let third = EditSession::new(
        EditorConfig::default(),
        Box::new(clock.clone()),
        Box::new(FileDraftStore::new(dir.path())),
    );
    assert_eq!(third.state(), &DocumentState::initial());
}
