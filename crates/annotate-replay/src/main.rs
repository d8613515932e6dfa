use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context as _, Result, bail};
use kb_annotate_core::{
    BlockContent, FloatingToolbar, KeyPress, Region, Selection, SelectionChange, TableGrid,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod script;

use crate::script::{Script, ScriptEvent};

type Updates = Rc<RefCell<Vec<BlockContent>>>;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: kb-annotate-replay <script.json>");
    };
    let script = Script::load(&path)?;
    tracing::info!(path = %path.display(), events = script.events.len(), "replaying");

    let updates: Updates = Rc::default();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match TableGrid::from_block(&script.block) {
        Some(grid) => {
            let sink = updates.clone();
            let mut grid = grid.on_update(move |content| sink.borrow_mut().push(content));
            for (ix, event) in script.events.into_iter().enumerate() {
                replay_table_event(&mut grid, event, ix);
                flush(&updates, &mut out)?;
            }
        }
        None => {
            let Some(region) = Region::from_block(&script.block) else {
                bail!("block content cannot be edited as a region");
            };
            let sink = updates.clone();
            let mut region = region.on_update(move |content| sink.borrow_mut().push(content));
            if let Some(config) = script.config {
                region = region.with_config(config);
            }
            let mut toolbar = FloatingToolbar::new().with_page_tree(&script.page_tree);
            for (ix, event) in script.events.into_iter().enumerate() {
                replay_region_event(&mut region, &mut toolbar, event, ix);
                flush(&updates, &mut out)?;
            }
            tracing::debug!(state = ?toolbar.state(), "final toolbar state");
        }
    }
    Ok(())
}

fn flush(updates: &Updates, out: &mut impl std::io::Write) -> Result<()> {
    for content in updates.borrow_mut().drain(..) {
        let line = content.to_json_string().context("serializing update")?;
        writeln!(out, "{line}").context("writing update")?;
    }
    Ok(())
}

fn replay_table_event(grid: &mut TableGrid, event: ScriptEvent, ix: usize) {
    let changed = match event {
        ScriptEvent::CellClick { row, col, shift } => {
            grid.handle_cell_click(row, col, shift);
            false
        }
        ScriptEvent::Merge => grid.merge_cells(),
        ScriptEvent::Unmerge { row, cell } => grid.unmerge_cells(row, cell),
        ScriptEvent::AddRow => grid.add_row(),
        ScriptEvent::AddColumn => grid.add_column(),
        ScriptEvent::RemoveRow { index } => grid.remove_row(index),
        ScriptEvent::RemoveColumn { col } => grid.remove_column(col),
        ScriptEvent::SetHeader { index, label } => grid.set_header(index, &label),
        ScriptEvent::SetCell { row, cell, html } => grid.set_cell_content(row, cell, &html),
        ScriptEvent::Disable { disabled } => {
            grid.set_disabled(disabled);
            false
        }
        other => {
            tracing::warn!(ix, event = ?other, "event does not apply to a table, skipped");
            return;
        }
    };
    tracing::debug!(ix, changed, "table event");
}

fn replay_region_event(
    region: &mut Region,
    toolbar: &mut FloatingToolbar,
    event: ScriptEvent,
    ix: usize,
) {
    if event.is_table_event() {
        tracing::warn!(ix, event = ?event, "table event on a text block, skipped");
        return;
    }

    match event {
        ScriptEvent::Focus => region.focus(),
        ScriptEvent::Blur => region.blur(),
        ScriptEvent::Select {
            anchor,
            focus,
            inside_region,
            bounds,
            viewport_width,
        } => {
            let change = SelectionChange {
                selection: Some(Selection::new(
                    region.point_at_offset(anchor),
                    region.point_at_offset(focus),
                )),
                inside_region,
                bounds,
                viewport_width,
            };
            toolbar.on_selection_change(region, &change);
        }
        ScriptEvent::ClearSelection => {
            toolbar.on_selection_change(region, &SelectionChange::default());
        }
        ScriptEvent::Click { target } => toolbar.on_window_click(target),
        ScriptEvent::Key { key, modifier } => {
            toolbar.on_key(region, KeyPress { key, modifier });
        }
        ScriptEvent::Format { kind } => {
            toolbar.format(region, kind);
        }
        ScriptEvent::ToggleColorPicker => {
            toolbar.toggle_color_picker(region);
        }
        ScriptEvent::Color { tag } => {
            toolbar.pick_color(region, tag);
        }
        ScriptEvent::ClearColor => {
            toolbar.clear_color(region);
        }
        ScriptEvent::BeginAddLink => {
            toolbar.begin_add_link(region);
            toolbar.take_focus_request();
        }
        ScriptEvent::SetUrl { url } => toolbar.set_pending_url(&url),
        ScriptEvent::ConfirmLink => {
            toolbar.confirm_link(region);
        }
        ScriptEvent::BeginLinkToPage => {
            toolbar.begin_link_to_page(region);
        }
        ScriptEvent::Search { query } => toolbar.set_page_search(&query),
        ScriptEvent::PickPage { id } => {
            toolbar.pick_page(region, &id);
        }
        ScriptEvent::Unlink => {
            toolbar.unlink(region);
        }
        ScriptEvent::Cancel => toolbar.cancel(region),
        ScriptEvent::External { html } => {
            region.set_external_content(&html);
        }
        ScriptEvent::Disable { disabled } => {
            region.set_disabled(disabled);
            if disabled {
                toolbar.hide();
            }
        }
        ScriptEvent::CellClick { .. }
        | ScriptEvent::Merge
        | ScriptEvent::Unmerge { .. }
        | ScriptEvent::AddRow
        | ScriptEvent::AddColumn
        | ScriptEvent::RemoveRow { .. }
        | ScriptEvent::RemoveColumn { .. }
        | ScriptEvent::SetHeader { .. }
        | ScriptEvent::SetCell { .. } => {}
    }
    tracing::debug!(ix, mode = ?toolbar.mode(), "region event");
}
