use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::BlockContent;
use crate::core::{BlockKind, Region, StyledRun, UpdateSink};
use crate::error::ContentError;
use crate::html::{parse_fragment, serialize_fragment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_colspan")]
    pub colspan: usize,
}

fn default_colspan() -> usize {
    1
}

impl TableCell {
    pub fn new(content: impl Into<String>, colspan: usize) -> Self {
        Self {
            content: content.into(),
            colspan: colspan.max(1),
        }
    }

    pub fn empty() -> Self {
        Self::new(String::new(), 1)
    }
}

pub type TableRow = Vec<TableCell>;

/// `{ headers, rows }` as persisted. Decoding goes through [`normalize_row`],
/// so every decoded row spans exactly `headers.len()` logical columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTableData")]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

#[derive(Deserialize)]
struct RawTableData {
    headers: Vec<Value>,
    #[serde(default)]
    rows: Vec<Value>,
}

impl From<RawTableData> for TableData {
    fn from(raw: RawTableData) -> Self {
        let headers: Vec<String> = raw.headers.iter().map(value_to_text).collect();
        let rows = raw
            .rows
            .iter()
            .map(|row| normalize_row(row, headers.len()))
            .collect();
        TableData { headers, rows }
    }
}

impl TableData {
    /// A table with `cols` default-labelled headers and `rows` empty rows.
    pub fn new(cols: usize, rows: usize) -> Self {
        let cols = cols.max(1);
        let headers = (1..=cols).map(|n| format!("Column {n}")).collect();
        let rows = (0..rows).map(|_| empty_row(cols)).collect();
        TableData { headers, rows }
    }

    pub fn from_value(value: Value) -> Result<Self, ContentError> {
        if !value.get("headers").is_some_and(Value::is_array) {
            return Err(ContentError::UnexpectedShape(
                "table content needs a `headers` array".to_string(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ContentError> {
        Self::from_value(serde_json::from_str(s)?)
    }

    /// Re-applies the colspan invariant to every row.
    pub fn normalized(mut self) -> Self {
        let width = self.headers.len();
        self.rows = self
            .rows
            .into_iter()
            .map(|row| fit_row(row, width))
            .collect();
        self
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

fn empty_row(width: usize) -> TableRow {
    (0..width).map(|_| TableCell::empty()).collect()
}

/// Coerces a stored row into canonical cells spanning `header_count` columns.
///
/// Accepted cell shapes: a plain string, a legacy object carrying `text`,
/// `html`, `value` or `content`, and `{content, colspan}`. A row may be an
/// array of cells or an object with a `cells` array.
pub fn normalize_row(raw: &Value, header_count: usize) -> TableRow {
    let cells: Vec<TableCell> = match raw {
        Value::Array(items) => items.iter().map(coerce_cell).collect(),
        Value::Object(obj) => match obj.get("cells") {
            Some(Value::Array(items)) => items.iter().map(coerce_cell).collect(),
            _ => vec![coerce_cell(raw)],
        },
        Value::Null => Vec::new(),
        other => vec![coerce_cell(other)],
    };
    fit_row(cells, header_count)
}

fn coerce_cell(raw: &Value) -> TableCell {
    match raw {
        Value::Object(obj) => {
            let content = ["content", "html", "text", "value"]
                .iter()
                .find_map(|key| obj.get(*key))
                .map(value_to_text)
                .unwrap_or_default();
            let colspan = obj.get("colspan").map(coerce_colspan).unwrap_or(1);
            TableCell::new(content, colspan)
        }
        other => TableCell::new(value_to_text(other), 1),
    }
}

fn coerce_colspan(raw: &Value) -> usize {
    let span = match raw {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 1.).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    span.and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1)
}

fn value_to_text(raw: &Value) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(obj) => ["content", "html", "text", "value"]
            .iter()
            .find_map(|key| obj.get(*key))
            .map(value_to_text)
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Pads a row with empty cells up to `width` logical columns. Rows wider than
/// `width` are truncated: the cell crossing the edge is narrowed and any cell
/// after it is dropped.
pub fn fit_row(cells: Vec<TableCell>, width: usize) -> TableRow {
    let mut out: TableRow = Vec::with_capacity(cells.len().max(width));
    let mut used = 0usize;
    let mut dropped = 0usize;
    let mut narrowed = false;

    for mut cell in cells {
        cell.colspan = cell.colspan.max(1);
        if used >= width {
            dropped += 1;
            continue;
        }
        let room = width - used;
        if cell.colspan > room {
            cell.colspan = room;
            narrowed = true;
        }
        used += cell.colspan;
        out.push(cell);
    }

    if dropped > 0 || narrowed {
        tracing::warn!(
            width,
            dropped,
            narrowed,
            "table row wider than its headers, truncated"
        );
    }

    while used < width {
        out.push(TableCell::empty());
        used += 1;
    }
    out
}

/// Logical column where the cell at `index` starts.
pub fn logical_start(row: &[TableCell], index: usize) -> usize {
    row.iter().take(index).map(|cell| cell.colspan).sum()
}

/// Array index of the cell covering logical column `col`.
pub fn cell_at_column(row: &[TableCell], col: usize) -> Option<usize> {
    let mut start = 0usize;
    for (ix, cell) in row.iter().enumerate() {
        let end = start + cell.colspan;
        if col < end {
            return Some(ix);
        }
        start = end;
    }
    None
}

/// Array indices of the cells intersecting logical columns `start..=end`.
pub fn cells_in_span(row: &[TableCell], start: usize, end: usize) -> Range<usize> {
    let first = cell_at_column(row, start);
    let last = cell_at_column(row, end).or_else(|| row.len().checked_sub(1));
    match (first, last) {
        (Some(first), Some(last)) if first <= last => first..last + 1,
        _ => 0..0,
    }
}

/// Cells selected in one row, in logical columns (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSelection {
    pub row: usize,
    pub start_col: usize,
    pub end_col: usize,
}

/// Column-span-aware grid editor. Each mutation replaces the table with a new
/// value and reports it through `on_update`.
pub struct TableGrid {
    data: TableData,
    selection: Option<CellSelection>,
    disabled: bool,
    on_update: Option<UpdateSink>,
}

impl std::fmt::Debug for TableGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableGrid")
            .field("data", &self.data)
            .field("selection", &self.selection)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl TableGrid {
    pub fn new(data: TableData) -> Self {
        Self {
            data: data.normalized(),
            selection: None,
            disabled: false,
            on_update: None,
        }
    }

    pub fn from_block(content: &BlockContent) -> Option<Self> {
        content.table().cloned().map(Self::new)
    }

    pub fn on_update(mut self, sink: impl FnMut(BlockContent) + 'static) -> Self {
        self.on_update = Some(Box::new(sink));
        self
    }

    pub fn set_on_update(&mut self, sink: impl FnMut(BlockContent) + 'static) {
        self.on_update = Some(Box::new(sink));
    }

    pub fn data(&self) -> &TableData {
        &self.data
    }

    pub fn selection(&self) -> Option<CellSelection> {
        self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
        if disabled {
            self.selection = None;
        }
    }

    /// Replaces the table with content from the owner.
    pub fn set_external_data(&mut self, data: TableData) {
        self.data = data.normalized();
        self.selection = None;
    }

    pub fn logical_start(&self, row: usize, index: usize) -> Option<usize> {
        let cells = self.data.rows.get(row)?;
        (index < cells.len()).then(|| logical_start(cells, index))
    }

    pub fn cell_at_column(&self, row: usize, col: usize) -> Option<usize> {
        cell_at_column(self.data.rows.get(row)?, col)
    }

    pub fn handle_cell_click(&mut self, row: usize, col: usize, shift: bool) {
        if self.disabled {
            return;
        }
        if row >= self.data.rows.len() || col >= self.data.headers.len() {
            return;
        }
        self.selection = Some(match self.selection {
            Some(sel) if shift && sel.row == row => CellSelection {
                row,
                start_col: sel.start_col.min(col),
                end_col: sel.end_col.max(col),
            },
            _ => CellSelection {
                row,
                start_col: col,
                end_col: col,
            },
        });
    }

    pub fn is_cell_selected(&self, row: usize, index: usize) -> bool {
        let Some(sel) = self.selection else {
            return false;
        };
        if sel.row != row {
            return false;
        }
        let Some(cells) = self.data.rows.get(row) else {
            return false;
        };
        let Some(cell) = cells.get(index) else {
            return false;
        };
        let start = logical_start(cells, index);
        let end = start + cell.colspan - 1;
        start <= sel.end_col && end >= sel.start_col
    }

    pub fn can_merge(&self) -> bool {
        if self.disabled {
            return false;
        }
        let Some(sel) = self.selection else {
            return false;
        };
        if sel.start_col == sel.end_col {
            return false;
        }
        let Some(cells) = self.data.rows.get(sel.row) else {
            return false;
        };
        cells_in_span(cells, sel.start_col, sel.end_col).len() >= 2
    }

    pub fn merge_cells(&mut self) -> bool {
        if !self.can_merge() {
            return false;
        }
        let Some(sel) = self.selection else {
            return false;
        };

        let mut next = self.data.clone();
        let cells = &mut next.rows[sel.row];
        let span = cells_in_span(cells, sel.start_col, sel.end_col);
        let start_col = logical_start(cells, span.start);
        let colspan: usize = cells[span.clone()].iter().map(|c| c.colspan).sum();
        let content = join_cell_contents(&cells[span.clone()]);
        cells.splice(span.clone(), [TableCell::new(content, colspan)]);

        tracing::debug!(
            row = sel.row,
            cells = span.len(),
            colspan,
            "merged table cells"
        );
        self.selection = Some(CellSelection {
            row: sel.row,
            start_col,
            end_col: start_col + colspan - 1,
        });
        self.commit(next);
        true
    }

    pub fn can_unmerge(&self, row: usize, index: usize) -> bool {
        !self.disabled
            && self
                .data
                .rows
                .get(row)
                .and_then(|cells| cells.get(index))
                .is_some_and(|cell| cell.colspan > 1)
    }

    pub fn unmerge_cells(&mut self, row: usize, index: usize) -> bool {
        if !self.can_unmerge(row, index) {
            return false;
        }
        let mut next = self.data.clone();
        let cells = &mut next.rows[row];
        let cell = cells[index].clone();
        let mut replacement = vec![TableCell::new(cell.content, 1)];
        replacement.extend((1..cell.colspan).map(|_| TableCell::empty()));
        cells.splice(index..index + 1, replacement);

        tracing::debug!(row, index, colspan = cell.colspan, "unmerged table cell");
        self.commit(next);
        true
    }

    pub fn add_column(&mut self) -> bool {
        if self.disabled {
            return false;
        }
        let mut next = self.data.clone();
        next.headers.push(format!("Column {}", next.headers.len() + 1));
        for row in &mut next.rows {
            row.push(TableCell::empty());
        }
        self.commit(next);
        true
    }

    pub fn add_row(&mut self) -> bool {
        if self.disabled {
            return false;
        }
        let mut next = self.data.clone();
        next.rows.push(empty_row(next.headers.len()));
        self.commit(next);
        true
    }

    /// Removes logical column `col`. A merged cell covering it shrinks by one
    /// column; a single cell is removed. The last column cannot be removed.
    pub fn remove_column(&mut self, col: usize) -> bool {
        if self.disabled || col >= self.data.headers.len() || self.data.headers.len() <= 1 {
            return false;
        }
        let mut next = self.data.clone();
        next.headers.remove(col);
        for row in &mut next.rows {
            let Some(ix) = cell_at_column(row, col) else {
                continue;
            };
            if row[ix].colspan > 1 {
                row[ix].colspan -= 1;
            } else {
                row.remove(ix);
            }
        }
        self.selection = None;
        self.commit(next);
        true
    }

    pub fn remove_row(&mut self, index: usize) -> bool {
        if self.disabled || index >= self.data.rows.len() {
            return false;
        }
        let mut next = self.data.clone();
        next.rows.remove(index);
        self.selection = match self.selection {
            Some(sel) if sel.row == index => None,
            Some(sel) if sel.row > index => Some(CellSelection {
                row: sel.row - 1,
                ..sel
            }),
            other => other,
        };
        self.commit(next);
        true
    }

    pub fn set_header(&mut self, index: usize, label: &str) -> bool {
        if self.disabled || self.data.headers.get(index).is_none_or(|h| h == label) {
            return false;
        }
        let mut next = self.data.clone();
        next.headers[index] = label.to_string();
        self.commit(next);
        true
    }

    pub fn set_cell_content(&mut self, row: usize, index: usize, html: &str) -> bool {
        if self.disabled {
            return false;
        }
        let unchanged = self
            .data
            .rows
            .get(row)
            .and_then(|cells| cells.get(index))
            .is_none_or(|cell| cell.content == html);
        if unchanged {
            return false;
        }
        let mut next = self.data.clone();
        next.rows[row][index].content = html.to_string();
        self.commit(next);
        true
    }

    /// An editing region for one cell. The host forwards its updates to
    /// [`TableGrid::set_cell_content`].
    pub fn cell_region(&self, row: usize, index: usize) -> Option<Region> {
        let cell = self.data.rows.get(row)?.get(index)?;
        let mut region = Region::from_html(&cell.content, BlockKind::RichText);
        region.set_disabled(self.disabled);
        Some(region)
    }

    fn commit(&mut self, next: TableData) {
        self.data = next;
        let content = BlockContent::Table(self.data.clone());
        if let Some(sink) = self.on_update.as_mut() {
            sink(content);
        }
    }
}

/// Joins the non-empty cell contents with one space. Each fragment is parsed
/// and the runs re-serialized, so the result is always well formed.
fn join_cell_contents(cells: &[TableCell]) -> String {
    let mut runs: Vec<StyledRun> = Vec::new();
    for cell in cells.iter().filter(|c| !c.content.trim().is_empty()) {
        if !runs.is_empty() {
            runs.push(StyledRun::plain(" "));
        }
        runs.extend(parse_fragment(&cell.content));
    }
    serialize_fragment(&crate::core::normalize_runs(runs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn total_colspan(row: &[TableCell]) -> usize {
        row.iter().map(|c| c.colspan).sum()
    }

    #[test]
    fn legacy_cells_are_coerced() {
        let row = normalize_row(
            &json!([
                "plain",
                { "text": "legacy" },
                { "content": "<b>x</b>", "colspan": "2" },
                { "content": 5, "colspan": 0 }
            ]),
            6,
        );
        assert_eq!(
            row,
            vec![
                TableCell::new("plain", 1),
                TableCell::new("legacy", 1),
                TableCell::new("<b>x</b>", 2),
                TableCell::new("5", 1),
                TableCell::empty(),
            ]
        );
    }

    #[test]
    fn over_wide_rows_are_truncated() {
        let row = normalize_row(
            &json!([
                { "content": "a", "colspan": 2 },
                { "content": "b", "colspan": 2 },
                { "content": "c", "colspan": 1 }
            ]),
            3,
        );
        assert_eq!(row, vec![TableCell::new("a", 2), TableCell::new("b", 1)]);
    }

    #[test]
    fn column_lookup_follows_colspans() {
        let row = vec![
            TableCell::new("a", 2),
            TableCell::new("b", 1),
            TableCell::new("c", 3),
        ];
        assert_eq!(logical_start(&row, 2), 3);
        assert_eq!(cell_at_column(&row, 1), Some(0));
        assert_eq!(cell_at_column(&row, 4), Some(2));
        assert_eq!(cell_at_column(&row, 6), None);
        assert_eq!(cells_in_span(&row, 1, 3), 0..3);
    }

    #[test]
    fn merged_markup_stays_well_formed() {
        let joined = join_cell_contents(&[
            TableCell::new("<b>bold", 1),
            TableCell::new("", 1),
            TableCell::new("x</i> &amp; y", 1),
        ]);
        assert_eq!(joined, "<strong>bold</strong> x &amp; y");
    }

    fn raw_cell() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[a-z]{0,4}".prop_map(Value::from),
            (0i64..5).prop_map(|span| json!({ "content": "c", "colspan": span })),
            "[a-z]{0,4}".prop_map(|text| json!({ "text": text })),
            (0i64..5).prop_map(|span| json!({ "html": "<i>h</i>", "colspan": span.to_string() })),
            Just(Value::Null),
        ]
    }

    proptest! {
        #[test]
        fn prop_normalized_rows_match_header_count(
            cells in prop::collection::vec(raw_cell(), 0..8),
            header_count in 1usize..8,
        ) {
            let row = normalize_row(&Value::Array(cells), header_count);
            prop_assert_eq!(total_colspan(&row), header_count);
            prop_assert!(row.iter().all(|c| c.colspan >= 1));
        }

        #[test]
        fn prop_merge_then_unmerge_conserves_columns(
            width in 2usize..7,
            a in 0usize..7,
            b in 0usize..7,
        ) {
            let (a, b) = (a.min(width - 1), b.min(width - 1));
            prop_assume!(a != b);
            let (start, end) = (a.min(b), a.max(b));

            let mut grid = TableGrid::new(TableData::new(width, 1));
            grid.handle_cell_click(0, start, false);
            grid.handle_cell_click(0, end, true);
            prop_assert!(grid.merge_cells());

            let row = &grid.data().rows[0];
            let ix = cell_at_column(row, start).unwrap();
            prop_assert_eq!(row[ix].colspan, end - start + 1);

            prop_assert!(grid.unmerge_cells(0, ix));
            let row = &grid.data().rows[0];
            prop_assert_eq!(row.len(), width);
            prop_assert_eq!(total_colspan(row), width);
        }
    }
}
