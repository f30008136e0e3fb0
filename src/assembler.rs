//! Final document assembly
//!
//! Output order is fixed: declaration, macro-declaration block, root element
//! with one self-referencing attribute per macro, changelog block, then every
//! directive in source order preceded by its carried-over comment.

use crate::directive::CompiledDirective;
use crate::error::Diagnostics;
use crate::macro_table::MacroTable;
use crate::types::*;
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};

const PRETTY_INDENT: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct DocumentAssembler {
    pretty: bool,
}

impl DocumentAssembler {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Produce the output text; pretty-printing falls back to the raw text on failure
    pub fn assemble(&self, document: &PluginDocument, diagnostics: &mut Diagnostics) -> String {
        let raw = Self::render(&document.macros, &document.changelog, &document.directives);
        if !self.pretty {
            return raw;
        }

        match pretty_print(&raw) {
            Ok(pretty) => pretty,
            Err(message) => {
                diagnostics.warn("output", format!("pretty-printing skipped: {}", message));
                raw
            }
        }
    }

    pub fn render(macros: &MacroTable, changelog: &str, directives: &[CompiledDirective]) -> String {
        let mut out = String::new();
        out.push_str(XML_DECLARATION);
        out.push_str("\n\n");

        out.push_str(&declaration_block(macros));
        out.push('\n');

        out.push_str(&root_start_tag(macros));
        out.push_str("\n\n");

        out.push_str(&format!("<{}>\n", CHANGES_ELEMENT));
        if !changelog.is_empty() {
            out.push_str(changelog);
            if !changelog.ends_with('\n') {
                out.push('\n');
            }
        }
        out.push_str(&format!("</{}>\n\n", CHANGES_ELEMENT));

        for directive in directives {
            directive.render_into(&mut out);
            out.push('\n');
        }

        out.push_str(&format!("</{}>\n", ROOT_ELEMENT));
        out
    }
}

/// `<!DOCTYPE ...>` block with values aligned past the longest name
pub fn declaration_block(macros: &MacroTable) -> String {
    let width = macros.longest_name();
    let mut out = format!("<!DOCTYPE {} [\n", ROOT_ELEMENT);
    for entry in macros.iter() {
        out.push_str(&format!(
            "<!ENTITY {:<width$} \"{}\">\n",
            entry.name,
            entry.raw_value.replace('"', "&quot;"),
            width = width
        ));
    }
    out.push_str("]>\n");
    out
}

/// Root start tag binding every macro name to a reference of itself
pub fn root_start_tag(macros: &MacroTable) -> String {
    let mut out = format!("<{}", ROOT_ELEMENT);
    for name in macros.names() {
        out.push_str(&format!(" {name}=\"&{name};\""));
    }
    out.push('>');
    out
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

const DOCTYPE_END: &str = "\n]>\n";

/// Re-read assembled markup and write it back with indentation
///
/// The prologue (declaration and macro block) is copied verbatim; only the
/// element tree is re-indented. Whitespace-only text is dropped between
/// elements but kept as the whole content of a leaf element.
pub fn pretty_print(text: &str) -> std::result::Result<String, String> {
    let (prologue, body) = match text.find(DOCTYPE_END) {
        Some(position) => text.split_at(position + DOCTYPE_END.len()),
        None => ("", text),
    };

    let mut reader = Reader::from_str(body.trim_start());
    reader.check_end_names(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', PRETTY_INDENT);
    let mut after_start = false;
    let mut held_blank: Option<BytesText<'static>> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;

        if let Event::Text(ref content) = event {
            if is_blank(content) {
                if after_start {
                    held_blank = Some(content.clone().into_owned());
                }
                after_start = false;
                continue;
            }
        }

        let blank = held_blank.take();
        match event {
            Event::Eof => break,
            Event::End(_) => {
                if let Some(blank) = blank {
                    writer.write_event(Event::Text(blank)).map_err(|e| e.to_string())?;
                }
            }
            _ => {}
        }
        after_start = matches!(event, Event::Start(_));
        writer.write_event(event).map_err(|e| e.to_string())?;
    }

    let body = String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())?;
    let mut out = String::with_capacity(prologue.len() + body.len() + 2);
    out.push_str(prologue);
    if !prologue.is_empty() {
        out.push('\n');
    }
    out.push_str(&body);
    out.push('\n');
    Ok(out)
}
