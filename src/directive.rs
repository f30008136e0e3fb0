//! Per-directive compilation: key classification, content precedence and
//! file content resolution

use crate::error::{CompilerError, Diagnostics};
use crate::escape::{self, standard_escape, EntityAwareEscaper, EscapeMode};
use crate::types::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Content block of a compiled directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedContent {
    /// File text, already escaped for element content
    Escaped(String),
    /// Raw file text, to be wrapped in a CDATA section
    Verbatim(String),
    /// Placeholder comment standing in for content that could not be read
    Diagnostic(String),
}

/// A directive ready for assembly; every string is already escaped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDirective {
    pub index: usize,
    pub comment: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<(String, String)>,
    pub content: Option<ResolvedContent>,
    /// No element is emitted, only the carried-over comment
    pub comment_only: bool,
}

impl CompiledDirective {
    pub fn has_diagnostic(&self) -> bool {
        matches!(self.content, Some(ResolvedContent::Diagnostic(_)))
    }

    /// Append the comment and element markup to `out`
    pub fn render_into(&self, out: &mut String) {
        if let Some(comment) = &self.comment {
            out.push_str(&escape::comment(comment));
            out.push('\n');
        }
        if self.comment_only {
            return;
        }

        out.push('<');
        out.push_str(DIRECTIVE_ELEMENT);
        for (name, value) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, value));
        }

        if self.children.is_empty() && self.content.is_none() {
            out.push_str(" />\n");
            return;
        }
        out.push_str(">\n");

        for (name, value) in &self.children {
            out.push_str(&format!("<{name}>{value}</{name}>\n"));
        }

        if let Some(content) = &self.content {
            out.push_str(&format!("<{}>\n", CONTENT_ELEMENT));
            match content {
                ResolvedContent::Escaped(text) => push_line(out, text),
                ResolvedContent::Verbatim(text) => {
                    let mut body = String::from("\n");
                    push_line(&mut body, text);
                    out.push_str(&escape::cdata(&body));
                    out.push('\n');
                }
                ResolvedContent::Diagnostic(message) => {
                    out.push_str(&escape::comment(message));
                    out.push('\n');
                }
            }
            out.push_str(&format!("</{}>\n", CONTENT_ELEMENT));
        }

        out.push_str(&format!("</{}>\n", DIRECTIVE_ELEMENT));
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }
}

fn push_line(out: &mut String, text: &str) {
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
}

/// Split a directive's keys into attributes, content candidates and child tags
///
/// When more than one content marker is present the one that appears last in
/// the source wins and a warning naming the directive is recorded.
pub fn classify(raw: &RawDirective, index: usize, diagnostics: &mut Diagnostics) -> Directive {
    let mut directive = Directive {
        index,
        comment: raw.comment.clone(),
        ..Directive::default()
    };
    let mut candidates: Vec<ContentReference> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();

    for (position, (key, value)) in raw.entries.iter().enumerate() {
        let order = position + 1;
        let text = match value {
            RawValue::Text(text) => text,
            RawValue::Nested(kind) => {
                skipped.push(format!("key '{}' holds a {} and was skipped", key, kind));
                continue;
            }
        };

        if let Some(mode) = ContentMode::from_key(key) {
            candidates.push(ContentReference {
                mode,
                path: text.clone(),
                order,
            });
        } else if let Some(name) = key.strip_prefix(ATTRIBUTE_MARKER) {
            if name.is_empty() {
                skipped.push("attribute key without a name was skipped".to_string());
            } else {
                directive.attributes.push((name.to_string(), text.clone()));
            }
        } else if key.is_empty() {
            skipped.push("empty key was skipped".to_string());
        } else {
            directive.children.push((key.clone(), text.clone()));
        }
    }

    let identifier = directive.identifier();
    for message in skipped {
        diagnostics.warn(identifier.as_str(), message);
    }

    if candidates.len() > 1 {
        let markers: Vec<_> = candidates.iter().map(|c| c.mode.marker()).collect();
        diagnostics.warn(
            identifier.as_str(),
            format!(
                "has both {} keys; using the one that appears last",
                markers.join(" and ")
            ),
        );
    }
    directive.content = candidates.into_iter().max_by_key(|candidate| candidate.order);

    directive
}

/// Compiles classified directives against a frozen macro name set
pub struct DirectiveCompiler<'a> {
    escaper: &'a EntityAwareEscaper,
    base_dir: PathBuf,
}

impl<'a> DirectiveCompiler<'a> {
    pub fn new(escaper: &'a EntityAwareEscaper, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            escaper,
            base_dir: base_dir.into(),
        }
    }

    /// Classify and compile one raw `FILE` item; `None` for an item with nothing to emit
    pub fn compile_raw(
        &self,
        raw: &RawDirective,
        index: usize,
        diagnostics: &mut Diagnostics,
    ) -> Option<CompiledDirective> {
        if let Some(problem) = &raw.malformed {
            diagnostics.warn(format!("item at index {}", index), format!("{}; item skipped", problem));
            return raw.comment.as_ref().map(|comment| comment_directive(index, comment));
        }

        let directive = classify(raw, index, diagnostics);
        if directive.is_comment_only() {
            return match &directive.comment {
                Some(comment) => Some(comment_directive(index, comment)),
                None => {
                    log::debug!("Skipping empty FILE item at index {}", index);
                    None
                }
            };
        }

        Some(self.compile(&directive, diagnostics))
    }

    pub fn compile(&self, directive: &Directive, diagnostics: &mut Diagnostics) -> CompiledDirective {
        let attributes = directive
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), self.escaper.escape(value, EscapeMode::Attribute)))
            .collect();

        let children = directive
            .children
            .iter()
            .map(|(name, value)| (name.clone(), self.escaper.escape(value, EscapeMode::Text)))
            .collect();

        let content = directive
            .content
            .as_ref()
            .map(|reference| self.resolve_content(reference, &directive.identifier(), diagnostics));

        CompiledDirective {
            index: directive.index,
            comment: directive.comment.clone(),
            attributes,
            children,
            content,
            comment_only: directive.is_comment_only(),
        }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn resolve_content(
        &self,
        reference: &ContentReference,
        identifier: &str,
        diagnostics: &mut Diagnostics,
    ) -> ResolvedContent {
        let full_path = self.resolve_path(&reference.path);
        log::debug!("Reading {} content from {}", reference.mode, full_path.display());

        match fs::read_to_string(&full_path) {
            Ok(text) => match reference.mode {
                ContentMode::Escaped => ResolvedContent::Escaped(standard_escape(&text, EscapeMode::Text)),
                ContentMode::Verbatim => ResolvedContent::Verbatim(text),
            },
            Err(e) => {
                let shown_path = self.escaper.escape(&reference.path, EscapeMode::Text);
                let placeholder = if e.kind() == ErrorKind::NotFound {
                    format!("Error: {} file not found: {}", reference.mode, shown_path)
                } else {
                    format!(
                        "Error reading {} file {}: {}",
                        reference.mode,
                        shown_path,
                        standard_escape(&e.to_string(), EscapeMode::Text)
                    )
                };
                let error = CompilerError::ContentRead {
                    path: full_path.display().to_string(),
                    message: e.to_string(),
                };
                diagnostics.recover(identifier, &error);
                ResolvedContent::Diagnostic(placeholder)
            }
        }
    }
}

fn comment_directive(index: usize, comment: &str) -> CompiledDirective {
    CompiledDirective {
        index,
        comment: Some(comment.to_string()),
        attributes: Vec::new(),
        children: Vec::new(),
        content: None,
        comment_only: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn raw(entries: &[(&str, &str)]) -> RawDirective {
        RawDirective {
            entries: entries
                .iter()
                .map(|(k, v)| (k.to_string(), RawValue::Text(v.to_string())))
                .collect(),
            ..RawDirective::default()
        }
    }

    fn escaper() -> EntityAwareEscaper {
        EntityAwareEscaper::new(["name", "gitURL", "MD5"])
    }

    #[test]
    fn test_classification_buckets() {
        let mut diagnostics = Diagnostics::new();
        let directive = classify(
            &raw(&[("@Name", "/boot/&name;.txz"), ("URL", "&gitURL;"), ("inline", "a.sh"), ("MD5", "&MD5;")]),
            0,
            &mut diagnostics,
        );

        assert_eq!(directive.attributes, vec![("Name".to_string(), "/boot/&name;.txz".to_string())]);
        let tags: Vec<_> = directive.children.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(tags, vec!["URL", "MD5"]);
        let content = directive.content.unwrap();
        assert_eq!(content.mode, ContentMode::Escaped);
        assert_eq!(content.order, 3);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_later_content_marker_wins() {
        let mut diagnostics = Diagnostics::new();
        let directive = classify(&raw(&[("CDATA", "v.sh"), ("INLINE", "e.sh")]), 4, &mut diagnostics);
        let content = directive.content.unwrap();
        assert_eq!(content.mode, ContentMode::Escaped);
        assert_eq!(content.path, "e.sh");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.warnings()[0].scope, "item at index 4");

        let mut diagnostics = Diagnostics::new();
        let directive = classify(
            &raw(&[("@Name", "x"), ("INLINE", "e.sh"), ("cdata", "v.sh")]),
            0,
            &mut diagnostics,
        );
        assert_eq!(directive.content.unwrap().mode, ContentMode::Verbatim);
        assert_eq!(diagnostics.warnings()[0].scope, "FILE item with @Name='x'");
    }

    #[test]
    fn test_nested_values_are_skipped_with_warning() {
        let mut diagnostics = Diagnostics::new();
        let mut item = raw(&[("@Name", "x")]);
        item.entries.push(("URL".to_string(), RawValue::Nested("sequence")));
        let directive = classify(&item, 0, &mut diagnostics);
        assert!(directive.children.is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_escaped_content() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sh"), "if [ 1 < 2 ] && true; then echo \"&name;\"; fi\n").unwrap();

        let escaper = escaper();
        let compiler = DirectiveCompiler::new(&escaper, dir.path());
        let mut diagnostics = Diagnostics::new();
        let compiled = compiler
            .compile_raw(&raw(&[("@Name", "/tmp/a.sh"), ("INLINE", "a.sh")]), 0, &mut diagnostics)
            .unwrap();

        // File content is always fully escaped, macro references included
        assert_eq!(
            compiled.content,
            Some(ResolvedContent::Escaped(
                "if [ 1 &lt; 2 ] &amp;&amp; true; then echo \"&amp;name;\"; fi\n".to_string()
            ))
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_verbatim_content_rendering() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("v.sh"), "echo '<ok>' && exit 0").unwrap();

        let escaper = escaper();
        let compiler = DirectiveCompiler::new(&escaper, dir.path());
        let mut diagnostics = Diagnostics::new();
        let compiled = compiler
            .compile_raw(&raw(&[("@Run", "/bin/bash"), ("CDATA", "v.sh")]), 0, &mut diagnostics)
            .unwrap();

        assert_eq!(
            compiled.render(),
            "<FILE Run=\"/bin/bash\">\n<INLINE>\n<![CDATA[\necho '<ok>' && exit 0\n]]>\n</INLINE>\n</FILE>\n"
        );
    }

    #[test]
    fn test_missing_content_becomes_diagnostic() {
        let dir = TempDir::new().unwrap();
        let escaper = escaper();
        let compiler = DirectiveCompiler::new(&escaper, dir.path());
        let mut diagnostics = Diagnostics::new();
        let compiled = compiler
            .compile_raw(&raw(&[("@Name", "x"), ("INLINE", "missing.sh")]), 2, &mut diagnostics)
            .unwrap();

        assert!(compiled.has_diagnostic());
        let rendered = compiled.render();
        assert!(rendered.contains("<!-- Error: INLINE file not found: missing.sh -->"));
        assert!(rendered.starts_with("<FILE Name=\"x\">\n"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.warnings()[0].scope, "FILE item with @Name='x'");
    }

    #[test]
    fn test_self_closing_and_comment_only() {
        let escaper = escaper();
        let compiler = DirectiveCompiler::new(&escaper, ".");
        let mut diagnostics = Diagnostics::new();

        let compiled = compiler
            .compile_raw(&raw(&[("@Name", "/boot/x"), ("@Mode", "0755")]), 0, &mut diagnostics)
            .unwrap();
        assert_eq!(compiled.render(), "<FILE Name=\"/boot/x\" Mode=\"0755\" />\n");

        let note = RawDirective::comment_only(Some("Just a note".to_string()));
        let compiled = compiler.compile_raw(&note, 1, &mut diagnostics).unwrap();
        assert_eq!(compiled.render(), "<!-- Just a note -->\n");

        assert!(compiler.compile_raw(&RawDirective::default(), 2, &mut diagnostics).is_none());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_children_and_attributes_keep_references() {
        let escaper = escaper();
        let compiler = DirectiveCompiler::new(&escaper, ".");
        let mut diagnostics = Diagnostics::new();
        let mut item = raw(&[("@Name", "/boot/&name;.txz"), ("URL", "&gitURL;/a&b"), ("MD5", "&MD5;")]);
        item.comment = Some("Package".to_string());

        let rendered = compiler.compile_raw(&item, 0, &mut diagnostics).unwrap().render();
        assert_eq!(
            rendered,
            "<!-- Package -->\n<FILE Name=\"/boot/&name;.txz\">\n<URL>&gitURL;/a&amp;b</URL>\n<MD5>&MD5;</MD5>\n</FILE>\n"
        );
    }

    #[test]
    fn test_malformed_item_keeps_comment() {
        let escaper = escaper();
        let compiler = DirectiveCompiler::new(&escaper, ".");
        let mut diagnostics = Diagnostics::new();
        let item = RawDirective {
            comment: Some("orphan".to_string()),
            malformed: Some("expected a mapping, found a scalar".to_string()),
            ..RawDirective::default()
        };
        let compiled = compiler.compile_raw(&item, 5, &mut diagnostics).unwrap();
        assert!(compiled.comment_only);
        assert_eq!(diagnostics.warnings()[0].scope, "item at index 5");
    }
}
