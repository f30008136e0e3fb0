//! Markup escaping that leaves known macro references intact

use crate::macro_table::MacroTable;
use regex::Regex;

/// Where the escaped text will be embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeMode {
    Text,
    /// Double-quoted attribute value; `"` is escaped as well
    Attribute,
}

fn push_escaped(out: &mut String, c: char, mode: EscapeMode) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' if mode == EscapeMode::Attribute => out.push_str("&quot;"),
        _ => out.push(c),
    }
}

fn escape_into(out: &mut String, text: &str, mode: EscapeMode) {
    for c in text.chars() {
        push_escaped(out, c, mode);
    }
}

/// Escape every special character, with no regard for macro references
pub fn standard_escape(text: &str, mode: EscapeMode) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text, mode);
    out
}

/// Frozen macro name set paired with the matching reference pattern
#[derive(Debug, Clone)]
pub struct EntityAwareEscaper {
    names: Vec<String>,
    pattern: Option<Regex>,
}

impl EntityAwareEscaper {
    /// Build an escaper from a name set; names are matched longest first
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.retain(|name| !name.is_empty());
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();

        let pattern = if names.is_empty() {
            None
        } else {
            let alternation = names
                .iter()
                .map(|name| regex::escape(name))
                .collect::<Vec<_>>()
                .join("|");
            // Escaped names only; a malformed pattern here is a bug
            Some(Regex::new(&format!("&(?:{});", alternation)).unwrap())
        };

        Self { names, pattern }
    }

    pub fn from_table(table: &MacroTable) -> Self {
        Self::new(table.names())
    }

    /// Known names, longest first
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Escape `text` in one left-to-right pass, copying known references through
    pub fn escape(&self, text: &str, mode: EscapeMode) -> String {
        let pattern = match &self.pattern {
            Some(pattern) => pattern,
            None => return standard_escape(text, mode),
        };

        let mut out = String::with_capacity(text.len());
        let mut last_end = 0;
        for reference in pattern.find_iter(text) {
            escape_into(&mut out, &text[last_end..reference.start()], mode);
            out.push_str(reference.as_str());
            last_end = reference.end();
        }
        escape_into(&mut out, &text[last_end..], mode);
        out
    }
}

/// Wrap text in a markup comment; `--` cannot appear inside one
pub fn comment(text: &str) -> String {
    let mut body = text.to_string();
    while body.contains("--") {
        body = body.replace("--", "- -");
    }
    if body.ends_with('-') {
        body.push(' ');
    }
    format!("<!-- {} -->", body)
}

/// Wrap text in a CDATA section, splitting any embedded terminator
pub fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}
