//! Core types and constants for the plugin descriptor compiler

use std::fmt;

// Source document sections
pub const SECTION_ENTITIES: &str = "ENTITIES";
pub const SECTION_CHANGES: &str = "CHANGES";
pub const SECTION_FILE: &str = "FILE";
pub const CHANGES_FILE_KEY: &str = "File";
pub const TOML_ATTR_TABLE: &str = "Attr";

// Directive key classification
pub const ATTRIBUTE_MARKER: char = '@';
pub const INLINE_MARKER: &str = "INLINE";
pub const CDATA_MARKER: &str = "CDATA";
pub const NAME_ATTRIBUTE: &str = "Name";

// Output element names
pub const ROOT_ELEMENT: &str = "PLUGIN";
pub const CHANGES_ELEMENT: &str = "CHANGES";
pub const DIRECTIVE_ELEMENT: &str = "FILE";
pub const CONTENT_ELEMENT: &str = "INLINE";
pub const XML_DECLARATION: &str = "<?xml version='1.0' standalone='yes'?>";

// Derived macro defaults
pub const DEFAULT_VERSION_MACRO: &str = "version";
pub const DEFAULT_HASH_MACRO: &str = "MD5";
pub const DEFAULT_PACKAGE_URL_MACRO: &str = "packageURL";
pub const DEFAULT_PLUGIN_URL_MACRO: &str = "pluginURL";
pub const VERSION_DATE_FORMAT: &str = "%Y.%m.%d";
pub const FIRST_VERSION_SUFFIX: char = 'a';

// Network and streaming limits
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FETCH_RETRIES: u32 = 3;
pub const RETRY_DELAY_MS: u64 = 1000;
pub const STREAM_BUFFER_SIZE: usize = 8192;
pub const MAX_DESCRIPTOR_SIZE: u64 = 4 * 1024 * 1024;

/// How a directive's file content is embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// Markup-escaped text (`INLINE` key)
    Escaped,
    /// CDATA section, never interpreted (`CDATA` key)
    Verbatim,
}

impl ContentMode {
    /// Classify a directive key, matching the content markers case-insensitively
    pub fn from_key(key: &str) -> Option<Self> {
        if key.eq_ignore_ascii_case(INLINE_MARKER) {
            Some(Self::Escaped)
        } else if key.eq_ignore_ascii_case(CDATA_MARKER) {
            Some(Self::Verbatim)
        } else {
            None
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Self::Escaped => INLINE_MARKER,
            Self::Verbatim => CDATA_MARKER,
        }
    }
}

impl fmt::Display for ContentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// A directive's chosen content source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReference {
    pub mode: ContentMode,
    pub path: String,
    /// 1-based position among the directive's source keys
    pub order: usize,
}

/// One key/value pair of a directive as it appeared in the source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    /// Sequences and mappings have no markup form; kept so they can be reported
    Nested(&'static str),
}

/// A `FILE` item before classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDirective {
    pub entries: Vec<(String, RawValue)>,
    pub comment: Option<String>,
    /// The item was not a mapping at all (e.g. a bare scalar)
    pub malformed: Option<String>,
}

impl RawDirective {
    pub fn comment_only(comment: Option<String>) -> Self {
        Self {
            comment,
            ..Self::default()
        }
    }
}

/// A classified file-install unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directive {
    /// Position in the `FILE` sequence (ad-hoc directives continue the numbering)
    pub index: usize,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<(String, String)>,
    pub content: Option<ContentReference>,
    pub comment: Option<String>,
}

impl Directive {
    /// A directive with no keys, carried only for its comment
    pub fn is_comment_only(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty() && self.content.is_none()
    }

    /// Human-readable identifier used in warnings
    pub fn identifier(&self) -> String {
        match self.attributes.iter().find(|(key, _)| key == NAME_ATTRIBUTE) {
            Some((_, name)) => format!("FILE item with @Name='{}'", name),
            None => format!("item at index {}", self.index),
        }
    }
}

/// Where the changelog text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesSource {
    Path(String),
    Missing,
    Invalid(String),
}

/// `FILE` section state after loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSection {
    Items(Vec<RawDirective>),
    Missing,
    Invalid(String),
}

/// The input document after format-specific parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub entities: Vec<(String, String)>,
    pub changes: ChangesSource,
    pub files: FileSection,
}

/// The root aggregate handed to the assembler
#[derive(Debug, Clone)]
pub struct PluginDocument {
    pub macros: crate::macro_table::MacroTable,
    pub changelog: String,
    pub directives: Vec<crate::directive::CompiledDirective>,
}
