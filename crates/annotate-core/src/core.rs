use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::{BlockContent, CalloutContent};
use crate::html::{parse_fragment, serialize_fragment};
use crate::link::LinkTarget;
use crate::palette::ColorTag;

/// Receives the re-serialized block content after every successful mutation.
pub type UpdateSink = Box<dyn FnMut(BlockContent)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkTarget>,
}

impl Marks {
    pub fn is_plain(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRun {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl StyledRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::default(),
        }
    }

    pub fn styled(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }
}

/// A boundary point: run index plus byte offset inside that run's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Point {
    pub run: usize,
    pub offset: usize,
}

impl Point {
    pub fn new(run: usize, offset: usize) -> Self {
        Self { run, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    Focused,
    #[default]
    Blurred,
}

const DEFAULT_TOOLBAR_HEIGHT: f32 = 40.;
const DEFAULT_TOOLBAR_WIDTH: f32 = 320.;
const DEFAULT_GAP: f32 = 8.;
const DEFAULT_SAFE_MARGIN: f32 = 60.;
const DEFAULT_EDGE_MARGIN: f32 = 8.;

/// Geometry used to place the floating toolbar. Zero fields fall back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RegionConfig {
    pub toolbar_height: f32,
    pub toolbar_width: f32,
    pub gap: f32,
    pub safe_margin: f32,
    pub edge_margin: f32,
}

impl RegionConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.toolbar_height <= 0. {
            self.toolbar_height = DEFAULT_TOOLBAR_HEIGHT;
        }
        if self.toolbar_width <= 0. {
            self.toolbar_width = DEFAULT_TOOLBAR_WIDTH;
        }
        if self.gap <= 0. {
            self.gap = DEFAULT_GAP;
        }
        if self.safe_margin <= 0. {
            self.safe_margin = DEFAULT_SAFE_MARGIN;
        }
        if self.edge_margin <= 0. {
            self.edge_margin = DEFAULT_EDGE_MARGIN;
        }
        self
    }
}

/// How a region wraps its HTML when reporting content to its owner.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BlockKind {
    #[default]
    RichText,
    Callout {
        variant: Option<String>,
        extra: Map<String, Value>,
    },
}

/// An editable text surface holding inline-styled runs.
pub struct Region {
    runs: Vec<StyledRun>,
    selection: Option<Selection>,
    focus: FocusState,
    disabled: bool,
    edited_while_focused: bool,
    pending_external: Option<Vec<StyledRun>>,
    kind: BlockKind,
    config: RegionConfig,
    on_update: Option<UpdateSink>,
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("runs", &self.runs)
            .field("selection", &self.selection)
            .field("focus", &self.focus)
            .field("disabled", &self.disabled)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Region {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            runs: vec![StyledRun::plain("")],
            selection: None,
            focus: FocusState::Blurred,
            disabled: false,
            edited_while_focused: false,
            pending_external: None,
            kind,
            config: RegionConfig::default().with_defaults(),
            on_update: None,
        }
    }

    pub fn from_html(html: &str, kind: BlockKind) -> Self {
        let mut region = Self::new(kind);
        region.runs = normalize_runs(parse_fragment(html));
        region
    }

    /// Builds a region for text-like block content. Tables have no single region.
    pub fn from_block(content: &BlockContent) -> Option<Self> {
        match content {
            BlockContent::Html(html) => Some(Self::from_html(html, BlockKind::RichText)),
            BlockContent::Callout(callout) => Some(Self::from_html(
                &callout.text,
                BlockKind::Callout {
                    variant: callout.variant.clone(),
                    extra: callout.extra.clone(),
                },
            )),
            BlockContent::Table(_) => None,
        }
    }

    pub fn with_config(mut self, config: RegionConfig) -> Self {
        self.config = config.with_defaults();
        self
    }

    pub fn on_update(mut self, sink: impl FnMut(BlockContent) + 'static) -> Self {
        self.on_update = Some(Box::new(sink));
        self
    }

    pub fn set_on_update(&mut self, sink: impl FnMut(BlockContent) + 'static) {
        self.on_update = Some(Box::new(sink));
    }

    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    pub fn runs(&self) -> &[StyledRun] {
        &self.runs
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.runs.iter().map(|run| run.text.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_html(&self) -> String {
        serialize_fragment(&self.runs)
    }

    pub fn content(&self) -> BlockContent {
        let html = self.to_html();
        match &self.kind {
            BlockKind::RichText => BlockContent::Html(html),
            BlockKind::Callout { variant, extra } => BlockContent::Callout(CalloutContent {
                text: html,
                variant: variant.clone(),
                extra: extra.clone(),
            }),
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection.map(|sel| Selection {
            anchor: self.clamp_point(sel.anchor),
            focus: self.clamp_point(sel.focus),
        });
    }

    /// Selects between two absolute byte offsets into the region text.
    pub fn select(&mut self, anchor: usize, focus: usize) {
        self.selection = Some(Selection {
            anchor: self.point_at_offset(anchor),
            focus: self.point_at_offset(focus),
        });
    }

    pub fn collapse_to(&mut self, offset: usize) {
        self.selection = Some(Selection::collapsed(self.point_at_offset(offset)));
    }

    /// Ordered byte range of the current selection; `None` when absent or collapsed.
    pub fn selected_range(&self) -> Option<Range<usize>> {
        let sel = self.selection.as_ref()?;
        let a = self.point_offset(sel.anchor);
        let b = self.point_offset(sel.focus);
        let range = a.min(b)..a.max(b);
        (!range.is_empty()).then_some(range)
    }

    pub fn point_offset(&self, point: Point) -> usize {
        let run_ix = point.run.min(self.runs.len().saturating_sub(1));
        let before: usize = self.runs[..run_ix].iter().map(|r| r.text.len()).sum();
        let run_text = self.runs.get(run_ix).map(|r| r.text.as_str()).unwrap_or("");
        before + clamp_to_char_boundary(run_text, point.offset)
    }

    /// Maps an absolute offset to a point. Offsets on a run boundary resolve to
    /// the end of the earlier run.
    pub fn point_at_offset(&self, offset: usize) -> Point {
        let mut cursor = 0usize;
        for (ix, run) in self.runs.iter().enumerate() {
            let end = cursor + run.text.len();
            if offset <= end {
                return Point::new(ix, clamp_to_char_boundary(&run.text, offset - cursor));
            }
            cursor = end;
        }
        let last = self.runs.len().saturating_sub(1);
        let len = self.runs.get(last).map(|r| r.text.len()).unwrap_or(0);
        Point::new(last, len)
    }

    pub fn focus_state(&self) -> FocusState {
        self.focus
    }

    pub fn is_focused(&self) -> bool {
        self.focus == FocusState::Focused
    }

    pub fn focus(&mut self) {
        if self.focus == FocusState::Blurred {
            self.edited_while_focused = false;
        }
        self.focus = FocusState::Focused;
    }

    /// Leaves the focused state and applies external content that arrived while
    /// the user was editing, unless a local edit superseded it.
    pub fn blur(&mut self) {
        self.focus = FocusState::Blurred;
        if let Some(runs) = self.pending_external.take() {
            if self.edited_while_focused {
                tracing::debug!("discarding external content superseded by a local edit");
            } else {
                self.load_runs(runs);
            }
        }
        self.edited_while_focused = false;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Assigns content coming from the owner. Only applied while blurred; while
    /// focused it is held until the next blur. Returns whether the runs changed.
    pub fn set_external_content(&mut self, html: &str) -> bool {
        let runs = parse_fragment(html);
        if self.is_focused() {
            self.pending_external = Some(runs);
            return false;
        }
        self.load_runs(runs)
    }

    /// Replaces the content for a new owning document and drops all transient state.
    pub fn reset_for_document(&mut self, html: &str) {
        self.runs = normalize_runs(parse_fragment(html));
        self.selection = None;
        self.pending_external = None;
        self.edited_while_focused = false;
    }

    fn load_runs(&mut self, runs: Vec<StyledRun>) -> bool {
        let runs = normalize_runs(runs);
        if runs == self.runs {
            return false;
        }
        self.runs = runs;
        let selection = self.selection.take();
        self.set_selection(selection);
        true
    }

    fn clamp_point(&self, point: Point) -> Point {
        let last = self.runs.len().saturating_sub(1);
        if point.run > last {
            let len = self.runs.get(last).map(|r| r.text.len()).unwrap_or(0);
            return Point::new(last, len);
        }
        let text = &self.runs[point.run].text;
        Point::new(point.run, clamp_to_char_boundary(text, point.offset))
    }

    pub(crate) fn text_in(&self, range: Range<usize>) -> String {
        let text = self.text();
        let start = clamp_to_char_boundary(&text, range.start);
        let end = clamp_to_char_boundary(&text, range.end);
        text.get(start..end).unwrap_or("").to_string()
    }

    pub(crate) fn runs_in(&self, range: Range<usize>) -> impl Iterator<Item = &StyledRun> {
        let mut cursor = 0usize;
        self.runs.iter().filter(move |run| {
            let start = cursor;
            cursor += run.text.len();
            start < range.end && cursor > range.start
        })
    }

    /// Marks of the run holding the character that starts at `offset`.
    pub(crate) fn marks_at(&self, offset: usize) -> Marks {
        let mut cursor = 0usize;
        for run in &self.runs {
            let end = cursor + run.text.len();
            if offset < end {
                return run.marks.clone();
            }
            cursor = end;
        }
        self.runs
            .last()
            .map(|run| run.marks.clone())
            .unwrap_or_default()
    }

    /// Index of the run the selection anchor sits in that satisfies `pred`.
    /// A caret on a run boundary also considers the neighbouring run.
    pub(crate) fn anchor_run_matching(&self, pred: impl Fn(&Marks) -> bool) -> Option<usize> {
        let sel = self.selection.as_ref()?;
        if let Some(range) = self.selected_range() {
            let mut cursor = 0usize;
            for (ix, run) in self.runs.iter().enumerate() {
                let end = cursor + run.text.len();
                if range.start < end {
                    return pred(&run.marks).then_some(ix);
                }
                cursor = end;
            }
            return None;
        }

        let point = self.clamp_point(sel.anchor);
        let run = self.runs.get(point.run)?;
        if pred(&run.marks) {
            return Some(point.run);
        }
        if point.offset == 0 && point.run > 0 && pred(&self.runs[point.run - 1].marks) {
            return Some(point.run - 1);
        }
        if point.offset == run.text.len()
            && let Some(next) = self.runs.get(point.run + 1)
            && pred(&next.marks)
        {
            return Some(point.run + 1);
        }
        None
    }

    /// Applies `apply` to the marks of every character in `range`, splitting
    /// runs at the boundaries. The selection keeps covering the same text.
    pub(crate) fn update_marks(&mut self, range: Range<usize>, apply: impl Fn(&mut Marks)) {
        let offsets = self.selection_offsets();
        let mut out: Vec<StyledRun> = Vec::with_capacity(self.runs.len() + 2);
        let mut cursor = 0usize;
        for run in std::mem::take(&mut self.runs) {
            let start = cursor;
            let end = cursor + run.text.len();
            cursor = end;

            if range.end <= start || range.start >= end {
                out.push(run);
                continue;
            }

            let sel_start = clamp_to_char_boundary(&run.text, range.start.saturating_sub(start));
            let sel_end = clamp_to_char_boundary(&run.text, range.end - start);

            let prefix = run.text.get(..sel_start).unwrap_or("");
            let middle = run.text.get(sel_start..sel_end).unwrap_or("");
            let suffix = run.text.get(sel_end..).unwrap_or("");

            if !prefix.is_empty() {
                out.push(StyledRun::styled(prefix, run.marks.clone()));
            }
            if !middle.is_empty() {
                let mut marks = run.marks.clone();
                apply(&mut marks);
                out.push(StyledRun::styled(middle, marks));
            }
            if !suffix.is_empty() {
                out.push(StyledRun::styled(suffix, run.marks.clone()));
            }
        }
        self.runs = normalize_runs(out);
        self.restore_selection_offsets(offsets);
    }

    /// Applies `apply` to whole runs `span` (run indices), keeping the selection.
    pub(crate) fn update_run_span(&mut self, span: Range<usize>, apply: impl Fn(&mut Marks)) {
        let offsets = self.selection_offsets();
        for run in self.runs.iter_mut().take(span.end).skip(span.start) {
            apply(&mut run.marks);
        }
        self.runs = normalize_runs(std::mem::take(&mut self.runs));
        self.restore_selection_offsets(offsets);
    }

    /// Replaces `range` with `run` and returns the offset just after it.
    pub(crate) fn replace_range(&mut self, range: Range<usize>, run: StyledRun) -> usize {
        let inserted_end = range.start + run.text.len();
        let mut replacement = Some(run);
        let mut out: Vec<StyledRun> = Vec::with_capacity(self.runs.len() + 2);
        let mut cursor = 0usize;
        for existing in std::mem::take(&mut self.runs) {
            let start = cursor;
            let end = cursor + existing.text.len();
            cursor = end;

            if end <= range.start {
                out.push(existing);
                continue;
            }
            if start >= range.end {
                out.extend(replacement.take());
                out.push(existing);
                continue;
            }

            if range.start > start {
                let cut = clamp_to_char_boundary(&existing.text, range.start - start);
                out.push(StyledRun::styled(
                    &existing.text[..cut],
                    existing.marks.clone(),
                ));
            }
            out.extend(replacement.take());
            if range.end < end {
                let cut = clamp_to_char_boundary(&existing.text, range.end - start);
                out.push(StyledRun::styled(&existing.text[cut..], existing.marks));
            }
        }
        out.extend(replacement.take());
        self.runs = normalize_runs(out);
        inserted_end
    }

    pub(crate) fn emit_update(&mut self) {
        if self.is_focused() {
            self.edited_while_focused = true;
        }
        let content = self.content();
        if let Some(sink) = self.on_update.as_mut() {
            sink(content);
        }
    }

    fn selection_offsets(&self) -> Option<(usize, usize)> {
        self.selection
            .as_ref()
            .map(|sel| (self.point_offset(sel.anchor), self.point_offset(sel.focus)))
    }

    fn restore_selection_offsets(&mut self, offsets: Option<(usize, usize)>) {
        if let Some((anchor, focus)) = offsets {
            self.select(anchor, focus);
        }
    }
}

/// Drops empty runs and merges neighbours with equal marks. Never returns an
/// empty list: a blank region holds one empty plain run.
pub fn normalize_runs(runs: Vec<StyledRun>) -> Vec<StyledRun> {
    let mut out: Vec<StyledRun> = Vec::with_capacity(runs.len());
    for run in runs {
        if run.text.is_empty() {
            continue;
        }
        if let Some(last) = out.last_mut()
            && last.marks == run.marks
        {
            last.text.push_str(&run.text);
            continue;
        }
        out.push(run);
    }
    if out.is_empty() {
        out.push(StyledRun::plain(""));
    }
    out
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> Marks {
        Marks {
            bold: true,
            ..Marks::default()
        }
    }

    #[test]
    fn normalize_merges_equal_neighbours_and_keeps_one_run() {
        let runs = normalize_runs(vec![
            StyledRun::plain("ab"),
            StyledRun::plain(""),
            StyledRun::plain("c"),
            StyledRun::styled("d", bold()),
        ]);
        assert_eq!(
            runs,
            vec![StyledRun::plain("abc"), StyledRun::styled("d", bold())]
        );
        assert_eq!(normalize_runs(Vec::new()), vec![StyledRun::plain("")]);
    }

    #[test]
    fn point_offsets_resolve_boundaries_to_the_earlier_run() {
        let mut region = Region::new(BlockKind::RichText);
        region.runs = vec![StyledRun::plain("ab"), StyledRun::styled("cd", bold())];
        assert_eq!(region.point_at_offset(2), Point::new(0, 2));
        assert_eq!(region.point_at_offset(3), Point::new(1, 1));
        assert_eq!(region.point_at_offset(99), Point::new(1, 2));
        assert_eq!(region.point_offset(Point::new(1, 0)), 2);
        assert_eq!(region.point_offset(Point::new(7, 1)), 3);
    }

    #[test]
    fn replace_range_splits_surrounding_runs() {
        let mut region = Region::new(BlockKind::RichText);
        region.runs = vec![StyledRun::plain("hello world")];
        let end = region.replace_range(6..11, StyledRun::styled("world", bold()));
        assert_eq!(end, 11);
        assert_eq!(
            region.runs(),
            &[
                StyledRun::plain("hello "),
                StyledRun::styled("world", bold())
            ]
        );
    }

    #[test]
    fn offsets_clamp_to_char_boundaries() {
        let mut region = Region::new(BlockKind::RichText);
        region.runs = vec![StyledRun::plain("héllo")];
        region.select(0, 2);
        assert_eq!(region.selected_range(), Some(0..1));
    }
}
