use std::cell::RefCell;
use std::rc::Rc;

use kb_annotate_core::{BlockContent, TableCell, TableData, TableGrid};

fn cell(content: &str, colspan: usize) -> TableCell {
    TableCell::new(content, colspan)
}

fn grid_from(json: serde_json::Value) -> TableGrid {
    TableGrid::new(TableData::from_value(json).unwrap())
}

fn recording(grid: TableGrid) -> (TableGrid, Rc<RefCell<Vec<BlockContent>>>) {
    let updates = Rc::new(RefCell::new(Vec::new()));
    let sink = updates.clone();
    let grid = grid.on_update(move |content| sink.borrow_mut().push(content));
    (grid, updates)
}

#[test]
fn merge_then_unmerge_round_trips_the_row_shape() {
    let (mut grid, updates) = recording(grid_from(serde_json::json!({
        "headers": ["A", "B", "C"],
        "rows": [["1", "2", "3"]]
    })));

    grid.handle_cell_click(0, 0, false);
    grid.handle_cell_click(0, 1, true);
    assert!(grid.can_merge());
    assert!(grid.merge_cells());
    assert_eq!(grid.data().rows[0], vec![cell("1 2", 2), cell("3", 1)]);

    let sel = grid.selection().unwrap();
    assert_eq!((sel.row, sel.start_col, sel.end_col), (0, 0, 1));

    assert!(grid.can_unmerge(0, 0));
    assert!(grid.unmerge_cells(0, 0));
    assert_eq!(
        grid.data().rows[0],
        vec![cell("1 2", 1), cell("", 1), cell("3", 1)]
    );

    let updates = updates.borrow();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1], BlockContent::Table(grid.data().clone()));
}

#[test]
fn merge_needs_two_distinct_cells() {
    let mut grid = grid_from(serde_json::json!({
        "headers": ["A", "B", "C"],
        "rows": [[{ "content": "wide", "colspan": 2 }, "c"]]
    }));

    grid.handle_cell_click(0, 0, false);
    grid.handle_cell_click(0, 1, true);
    assert!(!grid.can_merge(), "both columns belong to one cell");
    assert!(!grid.merge_cells());

    grid.handle_cell_click(0, 2, true);
    assert!(grid.can_merge());
    assert!(grid.merge_cells());
    assert_eq!(grid.data().rows[0], vec![cell("wide c", 3)]);
}

#[test]
fn shift_click_on_another_row_starts_a_new_selection() {
    let mut grid = TableGrid::new(TableData::new(3, 2));
    grid.handle_cell_click(0, 2, false);
    grid.handle_cell_click(0, 0, true);
    let sel = grid.selection().unwrap();
    assert_eq!((sel.start_col, sel.end_col), (0, 2));

    grid.handle_cell_click(1, 1, true);
    let sel = grid.selection().unwrap();
    assert_eq!((sel.row, sel.start_col, sel.end_col), (1, 1, 1));

    assert!(grid.is_cell_selected(1, 1));
    assert!(!grid.is_cell_selected(1, 0));
    grid.clear_selection();
    assert!(!grid.is_cell_selected(1, 1));
}

#[test]
fn remove_column_shrinks_spans_and_removes_single_cells() {
    let mut grid = grid_from(serde_json::json!({
        "headers": ["A", "B", "C"],
        "rows": [
            [{ "content": "ab", "colspan": 2 }, "c"],
            ["a", "b", "c"]
        ]
    }));

    assert!(grid.remove_column(1));
    assert_eq!(grid.data().headers, vec!["A", "C"]);
    assert_eq!(grid.data().rows[0], vec![cell("ab", 1), cell("c", 1)]);
    assert_eq!(grid.data().rows[1], vec![cell("a", 1), cell("c", 1)]);

    assert!(grid.remove_column(0));
    assert!(!grid.remove_column(0), "the last column stays");
    assert_eq!(grid.data().headers, vec!["C"]);
    for row in &grid.data().rows {
        assert_eq!(row.iter().map(|c| c.colspan).sum::<usize>(), 1);
    }
}

#[test]
fn add_and_remove_rows_and_columns() {
    let (mut grid, updates) = recording(TableGrid::new(TableData::new(2, 1)));

    assert!(grid.add_column());
    assert_eq!(grid.data().headers, vec!["Column 1", "Column 2", "Column 3"]);
    assert_eq!(grid.data().rows[0].len(), 3);

    assert!(grid.add_row());
    assert_eq!(grid.data().rows.len(), 2);
    assert_eq!(grid.data().rows[1], vec![TableCell::empty(); 3]);

    assert!(grid.remove_row(0));
    assert!(!grid.remove_row(5));
    assert_eq!(grid.data().rows.len(), 1);

    assert_eq!(updates.borrow().len(), 3);
}

#[test]
fn headers_and_cell_content_are_editable() {
    let mut grid = TableGrid::new(TableData::new(2, 1));
    assert!(grid.set_header(0, "Name"));
    assert!(!grid.set_header(0, "Name"));
    assert!(!grid.set_header(9, "x"));

    assert!(grid.set_cell_content(0, 1, "<strong>x</strong>"));
    assert_eq!(grid.data().rows[0][1].content, "<strong>x</strong>");

    let region = grid.cell_region(0, 1).unwrap();
    assert_eq!(region.text(), "x");
    assert!(grid.cell_region(3, 0).is_none());
}

#[test]
fn disabled_tables_ignore_mutations() {
    let (mut grid, updates) = recording(TableGrid::new(TableData::new(2, 1)));
    grid.set_disabled(true);

    grid.handle_cell_click(0, 0, false);
    assert!(grid.selection().is_none());
    assert!(!grid.add_row());
    assert!(!grid.add_column());
    assert!(!grid.remove_column(0));
    assert!(!grid.set_cell_content(0, 0, "x"));
    assert!(updates.borrow().is_empty());
}

#[test]
fn stored_rows_are_normalized_on_read() {
    let data = TableData::from_json_str(
        r#"{
            "headers": ["A", "B", "C"],
            "rows": [
                [{ "text": "legacy" }],
                { "cells": [{ "content": "x", "colspan": -2 }, "y"] },
                [{ "content": "a", "colspan": 2 }, { "content": "b", "colspan": 2 }, "lost"]
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(
        data.rows[0],
        vec![cell("legacy", 1), TableCell::empty(), TableCell::empty()]
    );
    assert_eq!(data.rows[1], vec![cell("x", 1), cell("y", 1), TableCell::empty()]);
    assert_eq!(data.rows[2], vec![cell("a", 2), cell("b", 1)]);
}

#[test]
fn malformed_table_json_is_an_error() {
    assert!(TableData::from_json_str(r#"{"rows": []}"#).is_err());
    assert!(TableData::from_json_str("not json").is_err());
}

#[test]
fn external_data_replaces_the_table_and_drops_the_selection() {
    let (mut grid, updates) = recording(grid_from(serde_json::json!({
        "headers": ["A", "B"],
        "rows": [["1", "2"]]
    })));
    grid.handle_cell_click(0, 0, false);
    grid.handle_cell_click(0, 1, true);
    assert!(grid.can_merge());

    grid.set_external_data(TableData {
        headers: vec!["X".to_string(), "Y".to_string(), "Z".to_string()],
        rows: vec![vec![cell("wide", 2), cell("a", 1), cell("lost", 1)], vec![cell("b", 1)]],
    });

    assert!(grid.selection().is_none());
    assert!(!grid.can_merge());
    assert!(!grid.is_cell_selected(0, 0));
    assert_eq!(grid.data().headers, ["X", "Y", "Z"]);
    assert_eq!(grid.data().rows[0], vec![cell("wide", 2), cell("a", 1)]);
    assert_eq!(
        grid.data().rows[1],
        vec![cell("b", 1), TableCell::empty(), TableCell::empty()]
    );
    assert!(updates.borrow().is_empty(), "owner data is not echoed back");

    grid.handle_cell_click(1, 1, false);
    grid.handle_cell_click(1, 2, true);
    assert!(grid.merge_cells());
    assert_eq!(updates.borrow().len(), 1);
}
