use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{Marks, Region, StyledRun};
use crate::link::LinkTarget;
use crate::palette::ColorTag;
use crate::selection::RangeMemory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Bold,
    Italic,
    Underline,
}

impl FormatKind {
    pub fn get(self, marks: &Marks) -> bool {
        match self {
            FormatKind::Bold => marks.bold,
            FormatKind::Italic => marks.italic,
            FormatKind::Underline => marks.underline,
        }
    }

    pub fn set(self, marks: &mut Marks, value: bool) {
        match self {
            FormatKind::Bold => marks.bold = value,
            FormatKind::Italic => marks.italic = value,
            FormatKind::Underline => marks.underline = value,
        }
    }

    /// Format toggled by `Mod+<key>`.
    pub fn from_shortcut(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'b' => Some(FormatKind::Bold),
            'i' => Some(FormatKind::Italic),
            'u' => Some(FormatKind::Underline),
            _ => None,
        }
    }
}

impl Region {
    /// Toggles `kind` over the selection. The mark is cleared when every
    /// selected character already has it, set otherwise.
    pub fn apply_format(&mut self, kind: FormatKind) -> bool {
        if self.is_disabled() {
            return false;
        }
        let Some(range) = self.selected_range() else {
            return false;
        };
        let all_set = self.runs_in(range.clone()).all(|run| kind.get(&run.marks));
        self.update_marks(range.clone(), |marks| kind.set(marks, !all_set));
        tracing::debug!(?kind, on = !all_set, ?range, "toggled format");
        self.emit_update();
        true
    }

    /// Replaces the selection with one run tagged `tag`, then collapses the
    /// caret after it.
    pub fn apply_color(&mut self, tag: ColorTag) -> bool {
        if self.is_disabled() {
            return false;
        }
        let Some(range) = self.selected_range() else {
            return false;
        };
        let text = self.text_in(range.clone());
        if text.trim().is_empty() {
            return false;
        }
        let mut marks = self.marks_at(range.start);
        marks.color = Some(tag);
        let end = self.replace_range(range, StyledRun::styled(text, marks));
        self.collapse_to(end);
        tracing::debug!(?tag, "applied color");
        self.emit_update();
        true
    }

    /// Turns the whole color-tagged span under the selection anchor back into
    /// plain text. An enclosing link survives.
    pub fn remove_color(&mut self) -> bool {
        if self.is_disabled() {
            return false;
        }
        let Some(ix) = self.anchor_run_matching(|marks| marks.color.is_some()) else {
            return false;
        };
        let key = self.runs()[ix].marks.clone();
        let span = self.contiguous_span(ix, |marks| {
            marks.color == key.color && marks.link == key.link
        });
        self.update_run_span(span, |marks| {
            *marks = Marks {
                link: marks.link.take(),
                ..Marks::default()
            };
        });
        tracing::debug!(color = ?key.color, "removed color");
        self.emit_update();
        true
    }

    /// Restores the saved range and wraps its text in a link to `target`.
    pub fn apply_link(&mut self, memory: &RangeMemory, target: LinkTarget) -> bool {
        if self.is_disabled() || !memory.restore(self) {
            return false;
        }
        let Some(range) = self.selected_range() else {
            return false;
        };
        let text = self.text_in(range.clone());
        if text.trim().is_empty() {
            return false;
        }
        let mut marks = self.marks_at(range.start);
        marks.link = Some(target);
        let internal = marks.link.as_ref().is_some_and(LinkTarget::is_internal);
        let end = self.replace_range(range, StyledRun::styled(text, marks));
        self.collapse_to(end);
        tracing::debug!(internal, "applied link");
        self.emit_update();
        true
    }

    /// Unwraps the link under the selection anchor. Color and underline are
    /// stripped from the unwrapped text as well.
    pub fn remove_link(&mut self) -> bool {
        if self.is_disabled() {
            return false;
        }
        let Some(ix) = self.anchor_run_matching(|marks| marks.link.is_some()) else {
            return false;
        };
        let link = self.runs()[ix].marks.link.clone();
        let span = self.contiguous_span(ix, |marks| marks.link == link);
        self.update_run_span(span, |marks| {
            marks.link = None;
            marks.color = None;
            marks.underline = false;
        });
        tracing::debug!("removed link");
        self.emit_update();
        true
    }

    /// Marks shown as active on the toolbar buttons.
    pub fn active_marks(&self) -> Marks {
        if let Some(range) = self.selected_range() {
            return self.marks_at(range.start);
        }
        match self.selection() {
            Some(sel) => {
                let point = self.point_at_offset(self.point_offset(sel.focus));
                self.runs()
                    .get(point.run)
                    .map(|run| run.marks.clone())
                    .unwrap_or_default()
            }
            None => Marks::default(),
        }
    }

    pub fn selected_text(&self) -> String {
        self.selected_range()
            .map(|range| self.text_in(range))
            .unwrap_or_default()
    }

    pub fn selection_has_link(&self) -> bool {
        match self.selected_range() {
            Some(range) => self.runs_in(range).any(|run| run.marks.link.is_some()),
            None => self
                .anchor_run_matching(|marks| marks.link.is_some())
                .is_some(),
        }
    }

    fn contiguous_span(&self, ix: usize, same: impl Fn(&Marks) -> bool) -> Range<usize> {
        let runs = self.runs();
        let mut start = ix;
        while start > 0 && same(&runs[start - 1].marks) {
            start -= 1;
        }
        let mut end = ix + 1;
        while end < runs.len() && same(&runs[end].marks) {
            end += 1;
        }
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BlockKind;

    #[test]
    fn shortcuts_map_to_formats() {
        assert_eq!(FormatKind::from_shortcut('B'), Some(FormatKind::Bold));
        assert_eq!(FormatKind::from_shortcut('u'), Some(FormatKind::Underline));
        assert_eq!(FormatKind::from_shortcut('k'), None);
    }

    #[test]
    fn contiguous_span_stops_at_differing_runs() {
        let region = Region::from_html(
            r#"a<span data-color="red">b<strong>c</strong></span><span data-color="blue">d</span>"#,
            BlockKind::RichText,
        );
        let red = Some(ColorTag::Red);
        assert_eq!(region.contiguous_span(1, |m| m.color == red), 1..3);
    }
}
