use serde::{Deserialize, Serialize};

use crate::core::{Region, RegionConfig, Selection};

/// Viewport-relative rectangle, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(top: f32, left: f32, width: f32, height: f32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.left + self.width / 2.
    }
}

/// A selection-change notification from the host.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionChange {
    /// `None` when the document has zero ranges.
    #[serde(default)]
    pub selection: Option<Selection>,
    /// Whether the range is anchored inside the owning region.
    #[serde(default)]
    pub inside_region: bool,
    /// Bounding rectangle of the selected range.
    #[serde(default)]
    pub bounds: Rect,
    #[serde(default)]
    pub viewport_width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolbarPosition {
    pub top: f32,
    pub left: f32,
}

/// Places the toolbar above the selection, or below it when there is not
/// enough room under the viewport top.
pub fn place_toolbar(
    bounds: Rect,
    viewport_width: f32,
    config: &RegionConfig,
) -> (ToolbarPosition, Placement) {
    let config = config.with_defaults();
    let above = bounds.top - config.toolbar_height - config.gap;
    let (top, placement) = if above < config.safe_margin {
        (bounds.bottom() + config.gap, Placement::Below)
    } else {
        (above, Placement::Above)
    };

    let min_left = config.edge_margin;
    let max_left = (viewport_width - config.toolbar_width - config.edge_margin).max(min_left);
    let left = (bounds.center_x() - config.toolbar_width / 2.).clamp(min_left, max_left);

    (ToolbarPosition { top, left }, placement)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Visibility {
    Hidden,
    Visible {
        position: ToolbarPosition,
        placement: Placement,
        selection_has_link: bool,
    },
}

/// Decides whether a selection change should show the contextual toolbar.
pub struct SelectionTracker;

impl SelectionTracker {
    /// Syncs the region's live selection with `change` and evaluates it.
    pub fn evaluate(region: &mut Region, change: &SelectionChange) -> Visibility {
        if !change.inside_region {
            region.set_selection(None);
            return Visibility::Hidden;
        }
        region.set_selection(change.selection);

        if region.is_disabled() || region.selected_range().is_none() {
            return Visibility::Hidden;
        }

        let (position, placement) =
            place_toolbar(change.bounds, change.viewport_width, region.config());
        Visibility::Visible {
            position,
            placement,
            selection_has_link: region.selection_has_link(),
        }
    }
}

/// Holds a copy of a selection while a secondary surface has focus.
#[derive(Debug, Default)]
pub struct RangeMemory {
    saved: Option<Selection>,
}

impl RangeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the region's current selection. Returns `false` if there is none.
    pub fn save(&mut self, region: &Region) -> bool {
        self.saved = region.selection().copied();
        self.saved.is_some()
    }

    pub fn save_selection(&mut self, selection: Selection) {
        self.saved = Some(selection);
    }

    /// Focuses `region` and makes the saved range its live selection.
    pub fn restore(&self, region: &mut Region) -> bool {
        let Some(selection) = self.saved else {
            return false;
        };
        region.focus();
        region.set_selection(Some(selection));
        true
    }

    pub fn clear(&mut self) {
        self.saved = None;
    }

    pub fn saved(&self) -> Option<Selection> {
        self.saved
    }
}
