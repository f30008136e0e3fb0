//! Loading descriptor documents (YAML or TOML) into a format-neutral shape
//!
//! Neither parser exposes comments, so the comments that precede each `FILE`
//! item are recovered by a line scan of the raw text and zipped back onto the
//! parsed items by position.

use crate::error::{CompilerError, Result};
use crate::types::*;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Input document syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Yaml,
    Toml,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

/// Read and parse a descriptor document from disk
pub fn load_document(path: &Path) -> Result<SourceDocument> {
    let text = fs::read_to_string(path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", path.display(), e),
    })?;
    let file = path.display().to_string();
    log::debug!("Loaded descriptor {} ({} bytes)", file, text.len());
    parse_document(&text, &file, SourceFormat::from_path(path))
}

pub fn parse_document(text: &str, file: &str, format: SourceFormat) -> Result<SourceDocument> {
    match format {
        SourceFormat::Yaml => parse_yaml(text, file),
        SourceFormat::Toml => parse_toml(text, file),
    }
}

/// Parse an ad-hoc directive given as an inline YAML (or JSON) mapping
pub fn parse_directive_fragment(text: &str) -> Result<RawDirective> {
    let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| CompilerError::InvalidFormat {
        message: format!("Invalid directive fragment '{}': {}", text, e),
    })?;
    match value {
        serde_yaml::Value::Mapping(mapping) => Ok(yaml_directive(&mapping, None)),
        _ => Err(CompilerError::InvalidFormat {
            message: format!("Directive fragment '{}' is not a mapping", text),
        }),
    }
}

// --- YAML ---

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => yaml_scalar(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        _ => "scalar",
    }
}

fn parse_yaml(text: &str, file: &str) -> Result<SourceDocument> {
    use serde_yaml::Value;

    let root: Value = serde_yaml::from_str(text).map_err(|e| CompilerError::parse(file, e.to_string()))?;
    let root = match root {
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(CompilerError::invalid_shape(
                "document",
                format!("expected a mapping at the top level, found a {}", yaml_kind(&other)),
            ))
        }
    };

    let entities = match root.get(SECTION_ENTITIES) {
        None => return Err(CompilerError::missing_section(SECTION_ENTITIES)),
        Some(Value::Mapping(mapping)) => {
            let mut pairs = Vec::with_capacity(mapping.len());
            for (key, value) in mapping {
                let name = yaml_scalar(key).unwrap_or_default();
                let value = yaml_scalar(value).ok_or_else(|| {
                    CompilerError::invalid_shape(SECTION_ENTITIES, format!("value of '{}' must be a scalar", name))
                })?;
                pairs.push((name, value));
            }
            pairs
        }
        Some(Value::Null) => Vec::new(),
        Some(other) => {
            return Err(CompilerError::invalid_shape(
                SECTION_ENTITIES,
                format!("expected a mapping, found a {}", yaml_kind(other)),
            ))
        }
    };

    let changes = match root.get(SECTION_CHANGES) {
        None => ChangesSource::Missing,
        Some(Value::String(path)) => ChangesSource::Path(path.clone()),
        Some(Value::Mapping(mapping)) => match mapping.get(CHANGES_FILE_KEY).and_then(yaml_scalar) {
            Some(path) if !path.is_empty() => ChangesSource::Path(path),
            _ => ChangesSource::Invalid(format!("mapping has no '{}' key", CHANGES_FILE_KEY)),
        },
        Some(other) => ChangesSource::Invalid(format!(
            "expected a path or a mapping with a '{}' key, found a {}",
            CHANGES_FILE_KEY,
            yaml_kind(other)
        )),
    };

    let files = match root.get(SECTION_FILE) {
        None | Some(Value::Null) => FileSection::Missing,
        Some(Value::Sequence(items)) => {
            let comments = yaml_item_comments(text);
            let directives = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let comment = comments.get(index).cloned().flatten();
                    match item {
                        Value::Mapping(mapping) => yaml_directive(mapping, comment),
                        Value::Null => RawDirective::comment_only(comment),
                        other => RawDirective {
                            comment,
                            malformed: Some(format!("expected a mapping, found a {}", yaml_kind(other))),
                            ..RawDirective::default()
                        },
                    }
                })
                .collect();
            FileSection::Items(directives)
        }
        Some(other) => FileSection::Invalid(format!("expected a sequence, found a {}", yaml_kind(other))),
    };

    Ok(SourceDocument {
        entities,
        changes,
        files,
    })
}

fn yaml_directive(mapping: &serde_yaml::Mapping, comment: Option<String>) -> RawDirective {
    let entries = mapping
        .iter()
        .map(|(key, value)| {
            let key = yaml_scalar(key).unwrap_or_default();
            let value = match yaml_scalar(value) {
                Some(text) => RawValue::Text(text),
                None => RawValue::Nested(yaml_kind(value)),
            };
            (key, value)
        })
        .collect();

    RawDirective {
        entries,
        comment,
        malformed: None,
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_sequence_item(stripped: &str) -> bool {
    stripped == "-" || stripped.starts_with("- ") || stripped.starts_with("-\t")
}

/// Comments carried by each item of the top-level `FILE` block sequence
///
/// A comment belongs to an item when it sits on the lines directly above the
/// item's dash (blank lines allowed) or on the dash line itself (`- # text`).
pub fn yaml_item_comments(text: &str) -> Vec<Option<String>> {
    let mut comments = Vec::new();
    let mut lines = text.lines().skip_while(|line| !is_file_key(line));
    if lines.next().is_none() {
        return comments;
    }

    let mut item_indent: Option<usize> = None;
    let mut pending: Vec<String> = Vec::new();

    for line in lines {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        let indent = indent_of(line);

        if let Some(body) = stripped.strip_prefix('#') {
            // Nested under the previous item's keys; not a leading comment
            if item_indent.map_or(false, |expected| indent > expected) {
                pending.clear();
            } else {
                pending.push(body.trim().to_string());
            }
            continue;
        }

        if is_sequence_item(stripped) && item_indent.map_or(true, |expected| expected == indent) {
            item_indent = Some(indent);
            let after_dash = stripped[1..].trim_start();
            if let Some(body) = after_dash.strip_prefix('#') {
                pending.push(body.trim().to_string());
            }
            let comment = if pending.is_empty() {
                None
            } else {
                Some(pending.join("\n"))
            };
            comments.push(comment);
            pending.clear();
            continue;
        }

        if indent == 0 && !is_sequence_item(stripped) {
            break;
        }
        pending.clear();
    }

    comments
}

fn is_file_key(line: &str) -> bool {
    let trimmed = line.trim_end();
    if indent_of(line) != 0 {
        return false;
    }
    ["FILE", "\"FILE\"", "'FILE'"].iter().any(|key| {
        trimmed
            .strip_prefix(key)
            .map_or(false, |rest| rest.trim_start().starts_with(':'))
    })
}

// --- TOML ---

fn toml_scalar(value: &toml::Value) -> Option<String> {
    use toml::Value;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(float_text(*f)),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(dt) => Some(dt.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

/// Float text that keeps a fractional part (`1.0` stays `1.0`)
fn float_text(value: f64) -> String {
    format!("{:?}", value)
}

/// `ENTITIES` values with their source spans, for literals the parsed value cannot reproduce
#[derive(Deserialize)]
struct EntityLiterals {
    #[serde(rename = "ENTITIES", default)]
    entities: IndexMap<String, toml::Spanned<toml::Value>>,
}

/// Float `ENTITIES` values exactly as written (`1.10` stays `1.10`)
fn toml_float_literals(text: &str) -> IndexMap<String, String> {
    let literals: EntityLiterals = match toml::from_str(text) {
        Ok(literals) => literals,
        Err(e) => {
            log::debug!("No span information for {}: {}", SECTION_ENTITIES, e);
            return IndexMap::new();
        }
    };

    literals
        .entities
        .into_iter()
        .filter(|(_, value)| matches!(value.get_ref(), toml::Value::Float(_)))
        .filter_map(|(name, value)| text.get(value.span()).map(|raw| (name, raw.trim().to_string())))
        .collect()
}

fn toml_kind(value: &toml::Value) -> &'static str {
    match value {
        toml::Value::Array(_) => "array",
        toml::Value::Table(_) => "table",
        _ => "scalar",
    }
}

fn parse_toml(text: &str, file: &str) -> Result<SourceDocument> {
    use toml::Value;

    let root: toml::Table = text.parse().map_err(|e: toml::de::Error| CompilerError::parse(file, e.to_string()))?;

    let entities = match root.get(SECTION_ENTITIES) {
        None => return Err(CompilerError::missing_section(SECTION_ENTITIES)),
        Some(Value::Table(table)) => {
            let literals = toml_float_literals(text);
            let mut pairs = Vec::with_capacity(table.len());
            for (name, value) in table {
                if let (Value::Float(_), Some(raw)) = (value, literals.get(name)) {
                    pairs.push((name.clone(), raw.clone()));
                    continue;
                }
                let value = toml_scalar(value).ok_or_else(|| {
                    CompilerError::invalid_shape(SECTION_ENTITIES, format!("value of '{}' must be a scalar", name))
                })?;
                pairs.push((name.clone(), value));
            }
            pairs
        }
        Some(other) => {
            return Err(CompilerError::invalid_shape(
                SECTION_ENTITIES,
                format!("expected a table, found a {}", toml_kind(other)),
            ))
        }
    };

    let changes = match root.get(SECTION_CHANGES) {
        None => ChangesSource::Missing,
        Some(Value::String(path)) => ChangesSource::Path(path.clone()),
        Some(Value::Table(table)) => match table.get(CHANGES_FILE_KEY).and_then(toml_scalar) {
            Some(path) if !path.is_empty() => ChangesSource::Path(path),
            _ => ChangesSource::Invalid(format!("table has no '{}' key", CHANGES_FILE_KEY)),
        },
        Some(other) => ChangesSource::Invalid(format!(
            "expected a path or a table with a '{}' key, found a {}",
            CHANGES_FILE_KEY,
            toml_kind(other)
        )),
    };

    let files = match root.get(SECTION_FILE) {
        None => FileSection::Missing,
        Some(Value::Array(items)) => {
            let comments = toml_item_comments(text);
            let directives = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let comment = comments.get(index).cloned().flatten();
                    match item {
                        Value::Table(table) => toml_directive(table, comment),
                        other => RawDirective {
                            comment,
                            malformed: Some(format!("expected a table, found a {}", toml_kind(other))),
                            ..RawDirective::default()
                        },
                    }
                })
                .collect();
            FileSection::Items(directives)
        }
        Some(other) => FileSection::Invalid(format!("expected an array of tables, found a {}", toml_kind(other))),
    };

    Ok(SourceDocument {
        entities,
        changes,
        files,
    })
}

fn toml_directive(table: &toml::Table, comment: Option<String>) -> RawDirective {
    let mut entries = Vec::with_capacity(table.len());

    for (key, value) in table {
        match (key.as_str(), value) {
            (TOML_ATTR_TABLE, toml::Value::Table(attrs)) => {
                for (name, attr_value) in attrs {
                    let raw = match toml_scalar(attr_value) {
                        Some(text) => RawValue::Text(text),
                        None => RawValue::Nested(toml_kind(attr_value)),
                    };
                    entries.push((format!("{}{}", ATTRIBUTE_MARKER, name), raw));
                }
            }
            _ => {
                let raw = match toml_scalar(value) {
                    Some(text) => RawValue::Text(text),
                    None => RawValue::Nested(toml_kind(value)),
                };
                entries.push((key.clone(), raw));
            }
        }
    }

    RawDirective {
        entries,
        comment,
        malformed: None,
    }
}

/// Comments on the lines directly above each `[[FILE]]` header
pub fn toml_item_comments(text: &str) -> Vec<Option<String>> {
    let mut comments = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if let Some(body) = stripped.strip_prefix('#') {
            pending.push(body.trim().to_string());
            continue;
        }
        if stripped == "[[FILE]]" {
            comments.push(if pending.is_empty() {
                None
            } else {
                Some(pending.join("\n"))
            });
        }
        pending.clear();
    }

    comments
}
