use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::Region;
use crate::link::{external_target, page_target};
use crate::marks::FormatKind;
use crate::page_tree::{FlatPage, PageTreeNode, filter_pages, find_page, flatten_pages};
use crate::palette::ColorTag;
use crate::selection::{
    Placement, RangeMemory, SelectionChange, SelectionTracker, ToolbarPosition, Visibility,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolbarMode {
    #[default]
    Hidden,
    Contextual,
    AddLink,
    LinkToPage,
}

impl ToolbarMode {
    /// AddLink and LinkToPage own focus and freeze the toolbar in place.
    pub fn is_secondary(self) -> bool {
        matches!(self, ToolbarMode::AddLink | ToolbarMode::LinkToPage)
    }
}

/// Everything the host needs to render the floating toolbar.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ToolbarState {
    pub visible: bool,
    pub position: ToolbarPosition,
    pub placement: Option<Placement>,
    pub mode: ToolbarMode,
    pub pending_url: String,
    pub selection_has_link: bool,
    pub color_picker_open: bool,
    pub page_search: String,
    /// Set when the URL field should take focus on the host's next frame.
    pub focus_request: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickTarget {
    Toolbar,
    Region,
    Outside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Char(char),
    Enter,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPress {
    pub key: Key,
    /// Ctrl on Linux/Windows, Cmd on macOS.
    #[serde(default)]
    pub modifier: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            modifier: false,
        }
    }

    pub fn with_mod(c: char) -> Self {
        Self {
            key: Key::Char(c),
            modifier: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Click,
    Keyboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Window-level event registration provided by the host.
pub trait WindowListeners {
    fn attach(&self, kind: ListenerKind) -> ListenerId;
    fn detach(&self, id: ListenerId);
}

/// Keeps the click-outside and keyboard listeners attached while alive.
pub struct ListenerGuard {
    listeners: Rc<dyn WindowListeners>,
    ids: Vec<ListenerId>,
}

impl ListenerGuard {
    pub fn acquire(listeners: Rc<dyn WindowListeners>) -> Self {
        let ids = [ListenerKind::Click, ListenerKind::Keyboard]
            .into_iter()
            .map(|kind| listeners.attach(kind))
            .collect();
        Self { listeners, ids }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.listeners.detach(id);
        }
    }
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

/// Mode machine for the floating toolbar of one region.
///
/// The toolbar does not own the region: every call that touches content takes
/// it as a parameter. A saved range lives in the toolbar's [`RangeMemory`]
/// while the link field or the page picker has focus.
#[derive(Default)]
pub struct FloatingToolbar {
    state: ToolbarState,
    memory: RangeMemory,
    pages: Vec<FlatPage>,
    listeners: Option<Rc<dyn WindowListeners>>,
    guard: Option<ListenerGuard>,
}

impl std::fmt::Debug for FloatingToolbar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FloatingToolbar")
            .field("state", &self.state)
            .field("memory", &self.memory)
            .field("pages", &self.pages.len())
            .field("listening", &self.guard.is_some())
            .finish()
    }
}

impl FloatingToolbar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_tree(mut self, tree: &[PageTreeNode]) -> Self {
        self.set_page_tree(tree);
        self
    }

    pub fn with_listeners(mut self, listeners: Rc<dyn WindowListeners>) -> Self {
        self.listeners = Some(listeners);
        self
    }

    pub fn set_page_tree(&mut self, tree: &[PageTreeNode]) {
        self.pages = flatten_pages(tree);
    }

    pub fn state(&self) -> &ToolbarState {
        &self.state
    }

    pub fn mode(&self) -> ToolbarMode {
        self.state.mode
    }

    pub fn range_memory(&self) -> &RangeMemory {
        &self.memory
    }

    pub fn is_listening(&self) -> bool {
        self.guard.is_some()
    }

    /// Ignored while a link field or the color picker holds focus, so the
    /// saved range outlives the focus loss they cause.
    pub fn on_selection_change(&mut self, region: &mut Region, change: &SelectionChange) {
        if self.state.mode.is_secondary() || self.state.color_picker_open {
            return;
        }
        match SelectionTracker::evaluate(region, change) {
            Visibility::Hidden => self.hide(),
            Visibility::Visible {
                position,
                placement,
                selection_has_link,
            } => {
                self.state.position = position;
                self.state.placement = Some(placement);
                self.state.selection_has_link = selection_has_link;
                self.set_mode(ToolbarMode::Contextual);
            }
        }
    }

    pub fn on_window_click(&mut self, target: ClickTarget) {
        if self.state.mode == ToolbarMode::Contextual && target == ClickTarget::Outside {
            self.hide();
        }
    }

    pub fn begin_add_link(&mut self, region: &Region) -> bool {
        if !self.can_open_secondary(region) {
            return false;
        }
        self.memory.save(region);
        self.state.pending_url.clear();
        self.state.color_picker_open = false;
        self.state.focus_request = true;
        self.set_mode(ToolbarMode::AddLink);
        true
    }

    /// Consumes the pending focus request for the URL field.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.state.focus_request)
    }

    pub fn set_pending_url(&mut self, url: &str) {
        if self.state.mode == ToolbarMode::AddLink {
            self.state.pending_url = url.to_string();
        }
    }

    /// Applies the pending URL as an external link. A blank URL keeps the
    /// link field open.
    pub fn confirm_link(&mut self, region: &mut Region) -> bool {
        if self.state.mode != ToolbarMode::AddLink {
            return false;
        }
        let Some(target) = external_target(&self.state.pending_url) else {
            return false;
        };
        let applied = region.apply_link(&self.memory, target);
        if !applied {
            tracing::debug!("saved range no longer holds linkable text");
        }
        self.hide();
        applied
    }

    pub fn begin_link_to_page(&mut self, region: &Region) -> bool {
        if !self.can_open_secondary(region) {
            return false;
        }
        self.memory.save(region);
        self.state.page_search.clear();
        self.state.color_picker_open = false;
        self.set_mode(ToolbarMode::LinkToPage);
        true
    }

    pub fn set_page_search(&mut self, query: &str) {
        if self.state.mode == ToolbarMode::LinkToPage {
            self.state.page_search = query.to_string();
        }
    }

    /// Pages matching the current search, in tree order.
    pub fn picker_entries(&self) -> Vec<FlatPage> {
        filter_pages(&self.pages, &self.state.page_search)
    }

    pub fn pick_page(&mut self, region: &mut Region, page_id: &str) -> bool {
        if self.state.mode != ToolbarMode::LinkToPage {
            return false;
        }
        let Some(page) = find_page(&self.pages, page_id) else {
            tracing::warn!(page_id, "picked page is not in the page tree");
            return false;
        };
        let applied = region.apply_link(&self.memory, page_target(page));
        self.hide();
        applied
    }

    /// Leaves the active sub-mode. From AddLink or LinkToPage the saved range
    /// is restored and the contextual toolbar comes back if it is still a
    /// real selection.
    pub fn cancel(&mut self, region: &mut Region) {
        match self.state.mode {
            ToolbarMode::Hidden => {}
            ToolbarMode::Contextual if self.state.color_picker_open => {
                self.state.color_picker_open = false;
                self.memory.clear();
            }
            ToolbarMode::Contextual => self.hide(),
            ToolbarMode::AddLink | ToolbarMode::LinkToPage => {
                self.memory.restore(region);
                self.memory.clear();
                self.state.pending_url.clear();
                self.state.page_search.clear();
                self.state.focus_request = false;
                if region.selected_range().is_some() {
                    self.state.selection_has_link = region.selection_has_link();
                    self.set_mode(ToolbarMode::Contextual);
                } else {
                    self.hide();
                }
            }
        }
    }

    pub fn toggle_color_picker(&mut self, region: &Region) -> bool {
        if self.state.mode != ToolbarMode::Contextual {
            return false;
        }
        if self.state.color_picker_open {
            self.state.color_picker_open = false;
            self.memory.clear();
        } else {
            self.memory.save(region);
            self.state.color_picker_open = true;
        }
        true
    }

    pub fn pick_color(&mut self, region: &mut Region, tag: ColorTag) -> bool {
        if self.state.mode != ToolbarMode::Contextual {
            return false;
        }
        self.memory.restore(region);
        let applied = region.apply_color(tag);
        self.close_color_picker();
        self.settle(region);
        applied
    }

    pub fn clear_color(&mut self, region: &mut Region) -> bool {
        if self.state.mode != ToolbarMode::Contextual {
            return false;
        }
        self.memory.restore(region);
        let removed = region.remove_color();
        self.close_color_picker();
        self.settle(region);
        removed
    }

    pub fn format(&mut self, region: &mut Region, kind: FormatKind) -> bool {
        region.apply_format(kind)
    }

    pub fn unlink(&mut self, region: &mut Region) -> bool {
        let removed = region.remove_link();
        if removed {
            self.state.selection_has_link = region.selection_has_link();
            self.settle(region);
        }
        removed
    }

    /// Handles a key press. Returns `true` when the key was consumed.
    pub fn on_key(&mut self, region: &mut Region, press: KeyPress) -> bool {
        match press.key {
            Key::Escape if self.state.mode != ToolbarMode::Hidden => {
                self.cancel(region);
                true
            }
            Key::Enter if self.state.mode == ToolbarMode::AddLink => {
                self.confirm_link(region);
                true
            }
            Key::Char(c)
                if press.modifier && region.is_focused() && !self.state.mode.is_secondary() =>
            {
                if c.eq_ignore_ascii_case(&'k') {
                    return self.begin_add_link(region);
                }
                match FormatKind::from_shortcut(c) {
                    Some(kind) => self.format(region, kind),
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// Hides the toolbar and releases the window listeners.
    pub fn hide(&mut self) {
        self.state.pending_url.clear();
        self.state.page_search.clear();
        self.state.color_picker_open = false;
        self.state.focus_request = false;
        self.state.selection_has_link = false;
        self.memory.clear();
        self.set_mode(ToolbarMode::Hidden);
    }

    /// Drops all transient state, e.g. when the owning document changes.
    pub fn reset(&mut self) {
        self.hide();
        self.state = ToolbarState::default();
    }

    fn can_open_secondary(&self, region: &Region) -> bool {
        !region.is_disabled()
            && !self.state.mode.is_secondary()
            && region.selected_range().is_some()
    }

    fn close_color_picker(&mut self) {
        self.state.color_picker_open = false;
        self.memory.clear();
    }

    /// Hides the toolbar once an action left only a caret behind.
    fn settle(&mut self, region: &Region) {
        if self.state.mode == ToolbarMode::Contextual && region.selected_range().is_none() {
            self.hide();
        }
    }

    fn set_mode(&mut self, mode: ToolbarMode) {
        if self.state.mode != mode {
            tracing::debug!(from = ?self.state.mode, to = ?mode, "toolbar mode");
        }
        self.state.mode = mode;
        self.state.visible = mode != ToolbarMode::Hidden;
        if self.state.visible {
            if self.guard.is_none()
                && let Some(listeners) = self.listeners.clone()
            {
                self.guard = Some(ListenerGuard::acquire(listeners));
            }
        } else {
            self.state.placement = None;
            self.guard = None;
        }
    }
}
