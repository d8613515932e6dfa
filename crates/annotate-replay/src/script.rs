use std::path::Path;

use anyhow::{Context as _, Result};
use kb_annotate_core::{
    BlockContent, ClickTarget, ColorTag, FormatKind, Key, PageTreeNode, Rect, RegionConfig,
};
use serde::Deserialize;

/// A recorded editing session.
#[derive(Debug, Deserialize)]
pub(crate) struct Script {
    #[serde(deserialize_with = "block_content")]
    pub block: BlockContent,
    #[serde(default)]
    pub config: Option<RegionConfig>,
    #[serde(default)]
    pub page_tree: Vec<PageTreeNode>,
    #[serde(default)]
    pub events: Vec<ScriptEvent>,
}

fn block_content<'de, D>(deserializer: D) -> std::result::Result<BlockContent, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    BlockContent::from_value(value).map_err(serde::de::Error::custom)
}

impl Script {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading replay script {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing replay script {}", path.display()))
    }
}

fn default_true() -> bool {
    true
}

fn default_viewport() -> f32 {
    1280.
}

/// Host events, one per line of a recording. Offsets are absolute byte
/// offsets into the region text.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum ScriptEvent {
    Focus,
    Blur,
    Select {
        anchor: usize,
        focus: usize,
        #[serde(default = "default_true")]
        inside_region: bool,
        #[serde(default)]
        bounds: Rect,
        #[serde(default = "default_viewport")]
        viewport_width: f32,
    },
    ClearSelection,
    Click {
        target: ClickTarget,
    },
    Key {
        key: Key,
        #[serde(default)]
        modifier: bool,
    },
    Format {
        kind: FormatKind,
    },
    ToggleColorPicker,
    Color {
        tag: ColorTag,
    },
    ClearColor,
    BeginAddLink,
    SetUrl {
        url: String,
    },
    ConfirmLink,
    BeginLinkToPage,
    Search {
        query: String,
    },
    PickPage {
        id: String,
    },
    Unlink,
    Cancel,
    External {
        html: String,
    },
    Disable {
        #[serde(default = "default_true")]
        disabled: bool,
    },
    CellClick {
        row: usize,
        col: usize,
        #[serde(default)]
        shift: bool,
    },
    Merge,
    Unmerge {
        row: usize,
        cell: usize,
    },
    AddRow,
    AddColumn,
    RemoveRow {
        index: usize,
    },
    RemoveColumn {
        col: usize,
    },
    SetHeader {
        index: usize,
        label: String,
    },
    SetCell {
        row: usize,
        cell: usize,
        html: String,
    },
}

impl ScriptEvent {
    pub(crate) fn is_table_event(&self) -> bool {
        matches!(
            self,
            ScriptEvent::CellClick { .. }
                | ScriptEvent::Merge
                | ScriptEvent::Unmerge { .. }
                | ScriptEvent::AddRow
                | ScriptEvent::AddColumn
                | ScriptEvent::RemoveRow { .. }
                | ScriptEvent::RemoveColumn { .. }
                | ScriptEvent::SetHeader { .. }
                | ScriptEvent::SetCell { .. }
        )
    }
}
