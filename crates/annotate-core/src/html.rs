//! Persisted HTML form of a region.
//!
//! Serialization nests tags in a fixed order (link, color, bold, italic,
//! underline) so neighbouring runs share their outer wrappers. Parsing is
//! tolerant: unknown tags are transparent, a closing tag pops the innermost
//! matching open tag, and a reader error keeps everything read so far.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{escape, partial_escape, resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesRef, BytesStart, Event};

use crate::core::{Marks, StyledRun, normalize_runs};
use crate::link::{INTERNAL_LINK_ATTR, LinkTarget};
use crate::palette::ColorTag;

const COLOR_ATTR: &str = "data-color";

#[derive(Debug, Clone, PartialEq)]
enum Layer {
    Link(LinkTarget),
    Color(ColorTag),
    Bold,
    Italic,
    Underline,
}

impl Layer {
    fn apply(&self, marks: &mut Marks) {
        match self {
            Layer::Link(target) => marks.link = Some(target.clone()),
            Layer::Color(tag) => marks.color = Some(*tag),
            Layer::Bold => marks.bold = true,
            Layer::Italic => marks.italic = true,
            Layer::Underline => marks.underline = true,
        }
    }

    fn open(&self, out: &mut String) {
        match self {
            Layer::Link(LinkTarget::External { href }) => {
                out.push_str("<a href=\"");
                out.push_str(&escape(href.as_str()));
                out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
            }
            Layer::Link(LinkTarget::Internal { slug_path }) => {
                out.push_str("<a href=\"");
                out.push_str(&escape(slug_path.as_str()));
                out.push_str("\" ");
                out.push_str(INTERNAL_LINK_ATTR);
                out.push_str("=\"true\">");
            }
            Layer::Color(tag) => {
                out.push_str("<span ");
                out.push_str(COLOR_ATTR);
                out.push_str("=\"");
                out.push_str(tag.name());
                out.push_str("\">");
            }
            Layer::Bold => out.push_str("<strong>"),
            Layer::Italic => out.push_str("<em>"),
            Layer::Underline => out.push_str("<u>"),
        }
    }

    fn close(&self, out: &mut String) {
        out.push_str(match self {
            Layer::Link(_) => "</a>",
            Layer::Color(_) => "</span>",
            Layer::Bold => "</strong>",
            Layer::Italic => "</em>",
            Layer::Underline => "</u>",
        });
    }
}

fn layers(marks: &Marks) -> Vec<Layer> {
    let mut out = Vec::with_capacity(5);
    if let Some(target) = &marks.link {
        out.push(Layer::Link(target.clone()));
    }
    if let Some(tag) = marks.color {
        out.push(Layer::Color(tag));
    }
    if marks.bold {
        out.push(Layer::Bold);
    }
    if marks.italic {
        out.push(Layer::Italic);
    }
    if marks.underline {
        out.push(Layer::Underline);
    }
    out
}

pub fn serialize_fragment(runs: &[StyledRun]) -> String {
    let mut out = String::new();
    let mut open: Vec<Layer> = Vec::new();

    for run in runs {
        if run.text.is_empty() {
            continue;
        }
        let wanted = layers(&run.marks);
        let common = open
            .iter()
            .zip(&wanted)
            .take_while(|(a, b)| a == b)
            .count();
        while open.len() > common {
            if let Some(layer) = open.pop() {
                layer.close(&mut out);
            }
        }
        for layer in &wanted[common..] {
            layer.open(&mut out);
            open.push(layer.clone());
        }
        push_escaped_text(&run.text, &mut out);
    }

    while let Some(layer) = open.pop() {
        layer.close(&mut out);
    }
    out
}

fn push_escaped_text(text: &str, out: &mut String) {
    for (ix, line) in text.split('\n').enumerate() {
        if ix > 0 {
            out.push_str("<br>");
        }
        out.push_str(&partial_escape(line));
    }
}

pub fn parse_fragment(html: &str) -> Vec<StyledRun> {
    let mut reader = Reader::from_str(html);
    {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;
    }

    let mut stack: Vec<(Vec<u8>, Option<Layer>)> = Vec::new();
    let mut runs: Vec<StyledRun> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_ascii_lowercase();
                match name.as_slice() {
                    b"br" => push_text(&mut runs, &stack, "\n"),
                    b"div" | b"p" => {
                        start_block(&mut runs, &stack);
                        stack.push((name, None));
                    }
                    _ => {
                        let layer = layer_for(&name, &e);
                        stack.push((name, layer));
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if e.name().as_ref().eq_ignore_ascii_case(b"br") {
                    push_text(&mut runs, &stack, "\n");
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name().as_ref().to_ascii_lowercase();
                if let Some(pos) = stack.iter().rposition(|(open, _)| *open == name) {
                    stack.truncate(pos);
                }
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(e.as_ref());
                push_text(&mut runs, &stack, &raw);
            }
            Ok(Event::CData(e)) => {
                let raw = String::from_utf8_lossy(e.as_ref());
                push_text(&mut runs, &stack, &raw);
            }
            Ok(Event::GeneralRef(e)) => push_text(&mut runs, &stack, &resolve_reference(&e)),
            Ok(Event::Eof) => break,
            Err(err) => {
                tracing::warn!(
                    position = reader.error_position(),
                    "malformed html fragment, keeping content read so far: {err}"
                );
                break;
            }
            _ => {}
        }
    }

    normalize_runs(runs)
}

fn current_marks(stack: &[(Vec<u8>, Option<Layer>)]) -> Marks {
    let mut marks = Marks::default();
    for layer in stack.iter().filter_map(|(_, layer)| layer.as_ref()) {
        layer.apply(&mut marks);
    }
    marks
}

fn push_text(runs: &mut Vec<StyledRun>, stack: &[(Vec<u8>, Option<Layer>)], text: &str) {
    if text.is_empty() {
        return;
    }
    runs.push(StyledRun::styled(text, current_marks(stack)));
}

fn start_block(runs: &mut Vec<StyledRun>, stack: &[(Vec<u8>, Option<Layer>)]) {
    let ends_with_break = runs
        .iter()
        .rev()
        .find(|run| !run.text.is_empty())
        .is_none_or(|run| run.text.ends_with('\n'));
    if !ends_with_break {
        push_text(runs, stack, "\n");
    }
}

fn layer_for(name: &[u8], e: &BytesStart) -> Option<Layer> {
    match name {
        b"b" | b"strong" => Some(Layer::Bold),
        b"i" | b"em" => Some(Layer::Italic),
        b"u" | b"ins" => Some(Layer::Underline),
        b"span" | b"font" => {
            attr_value(e, COLOR_ATTR.as_bytes())
                .and_then(|value| ColorTag::from_name(&value))
                .map(Layer::Color)
        }
        b"a" => {
            let href = attr_value(e, b"href")?;
            if href.trim().is_empty() {
                return None;
            }
            let internal = attr_value(e, INTERNAL_LINK_ATTR.as_bytes())
                .is_some_and(|value| !value.eq_ignore_ascii_case("false"));
            Some(Layer::Link(LinkTarget::from_anchor(&href, internal)))
        }
        _ => None,
    }
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref().eq_ignore_ascii_case(key))
        .map(|attr| unescape_lenient(&String::from_utf8_lossy(&attr.value)).into_owned())
}

/// Text for an `&name;` reference. Unknown names stay literal.
fn resolve_reference(e: &BytesRef) -> String {
    let name = String::from_utf8_lossy(e.as_ref());
    match e.resolve_char_ref() {
        Ok(Some(c)) => c.to_string(),
        Ok(None) => match resolve_html5_entity(&name) {
            Some(resolved) => resolved.to_string(),
            None => format!("&{name};"),
        },
        Err(err) => {
            tracing::debug!(%name, "bad character reference: {err}");
            format!("&{name};")
        }
    }
}

/// Unescapes HTML5 entities in an attribute value. Bare ampersands and
/// unknown entities are kept as written instead of failing the whole value.
fn unescape_lenient(raw: &str) -> Cow<'_, str> {
    if let Ok(value) = unescape_with(raw, resolve_html5_entity) {
        return value;
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = rest[amp..]
            .find(';')
            .filter(|semi| !rest[amp + 1..amp + semi].contains('&'))
            .map(|semi| &rest[amp..=amp + semi]);
        match candidate.map(|c| (c, unescape_with(c, resolve_html5_entity))) {
            Some((c, Ok(value))) => {
                out.push_str(&value);
                rest = &rest[amp + c.len()..];
            }
            _ => {
                out.push('&');
                rest = &rest[amp + 1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
