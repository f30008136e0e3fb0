//! Plugin Descriptor Compiler
//!
//! Compiles a structured descriptor document (YAML or TOML) into a PLG
//! plugin file: a macro-declaration block followed by a `PLUGIN` element
//! whose `FILE` children reference those macros.
//!
//! # Basic Usage
//!
//! ```no_run
//! use plgc::{compile_file, Result};
//!
//! fn main() -> Result<()> {
//!     compile_file("plugin.yaml", "plugin.plg")?;
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Load**: parse the document into sections, recovering `FILE` comments
//! 2. **Macros**: build the macro table and apply command-line overrides
//! 3. **Derive**: add a date-based version and an artifact hash when absent
//! 4. **Freeze**: validate every macro and build the entity-aware escaper
//! 5. **Directives**: classify and compile each `FILE` item, reading content files
//! 6. **Assemble**: emit declarations, root element, changelog and directives

pub mod assembler;
pub mod cli;
pub mod directive;
pub mod error;
pub mod escape;
pub mod fetch;
pub mod hash;
pub mod macro_table;
pub mod source;
pub mod types;
pub mod version;

use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

// Re-export commonly used types and functions
pub use assembler::DocumentAssembler;
pub use directive::{classify, CompiledDirective, DirectiveCompiler, ResolvedContent};
pub use error::{CompilerError, Diagnostics, Result, Warning};
pub use escape::{standard_escape, EntityAwareEscaper, EscapeMode};
pub use fetch::{ByteFetcher, HttpFetcher, MemoryFetcher};
pub use hash::{ArchiveSpec, HashResolver, HashSettings};
pub use macro_table::{Macro, MacroTable};
pub use source::{load_document, parse_document, SourceFormat};
pub use types::*;
pub use version::{next_version, VersionResolver, VersionSettings};

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Compilation options and settings
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Enable debug logging of each pipeline phase
    pub debug_mode: bool,

    /// Root for relative content, changelog and archive paths (default: the input's directory)
    pub base_dir: Option<PathBuf>,

    /// Macro definitions that replace or extend the document's `ENTITIES`
    pub macro_overrides: Vec<(String, String)>,

    /// Changelog path used instead of the document's `CHANGES`
    pub changes_override: Option<String>,

    /// Extra directives given as inline YAML mappings, appended after the document's
    pub extra_directives: Vec<String>,

    /// Previously published version; skips the descriptor fetch
    pub previous_version: Option<String>,

    /// Date used for version derivation (default: today, local time)
    pub today: Option<NaiveDate>,

    pub version_macro: String,
    pub hash_macro: String,
    pub package_url_macro: String,
    pub plugin_url_macro: String,

    /// Build the package locally and hash the result instead of downloading it
    pub archive: Option<ArchiveSpec>,

    /// Abort when the hash cannot be derived
    pub hash_required: bool,

    /// Re-indent the output
    pub pretty: bool,

    /// Never touch the network
    pub offline: bool,

    pub fetch_timeout_secs: u64,
    pub fetch_retries: u32,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            base_dir: None,
            macro_overrides: Vec::new(),
            changes_override: None,
            extra_directives: Vec::new(),
            previous_version: None,
            today: None,
            version_macro: DEFAULT_VERSION_MACRO.to_string(),
            hash_macro: DEFAULT_HASH_MACRO.to_string(),
            package_url_macro: DEFAULT_PACKAGE_URL_MACRO.to_string(),
            plugin_url_macro: DEFAULT_PLUGIN_URL_MACRO.to_string(),
            archive: None,
            hash_required: false,
            pretty: false,
            offline: false,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            fetch_retries: DEFAULT_FETCH_RETRIES,
        }
    }
}

impl CompilerOptions {
    /// Byte fetcher matching these options
    pub fn fetcher(&self) -> Result<Box<dyn ByteFetcher>> {
        if self.offline {
            Ok(Box::new(MemoryFetcher::new()))
        } else {
            Ok(Box::new(HttpFetcher::with_limits(
                Duration::from_secs(self.fetch_timeout_secs),
                self.fetch_retries,
            )?))
        }
    }
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationStats {
    /// Number of declared macros, derived ones included
    pub macro_count: usize,

    /// Number of emitted directives (comment-only ones included)
    pub directive_count: usize,

    /// Number of recovered failures
    pub warning_count: usize,

    /// Number of directives whose content was replaced by a diagnostic comment
    pub diagnostic_count: usize,

    pub derived_version: Option<String>,
    pub derived_hash: Option<String>,

    /// Final output size in bytes
    pub output_size: u64,

    /// Compilation time in milliseconds
    pub compile_time_ms: u64,
}

/// Result of a successful compile run
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub text: String,
    pub warnings: Vec<Warning>,
    pub stats: CompilationStats,
}

/// Main compiler entry point with default options
pub fn compile_file(input_path: &str, output_path: &str) -> Result<CompilationStats> {
    compile_file_with_options(input_path, output_path, CompilerOptions::default())
}

/// Compile with custom options and write the result to `output_path`
pub fn compile_file_with_options(
    input_path: &str,
    output_path: &str,
    options: CompilerOptions,
) -> Result<CompilationStats> {
    let fetcher = options.fetcher()?;
    let output = compile_path(Path::new(input_path), &options, fetcher.as_ref())?;

    fs::write(output_path, &output.text)?;

    if options.debug_mode {
        log::info!("Compilation successful!");
        log::info!("Output size: {} bytes", output.stats.output_size);
        log::debug!("Full stats: {:?}", output.stats);
    }

    Ok(output.stats)
}

/// Compile a descriptor on disk and return the text without writing it anywhere
pub fn compile_path(input_path: &Path, options: &CompilerOptions, fetcher: &dyn ByteFetcher) -> Result<CompileOutput> {
    if options.debug_mode {
        log::info!("{} v{}", NAME, VERSION);
        log::info!("Compiling '{}'...", input_path.display());
        log::debug!("Compiler options: {:?}", options);
    }

    let document = source::load_document(input_path)?;

    let mut options = options.clone();
    if options.base_dir.is_none() {
        options.base_dir = input_path.parent().map(Path::to_path_buf);
    }
    compile_document(document, &options, fetcher)
}

/// Files a compile of `input_path` reads: the descriptor, its changelog and every content file
///
/// Paths that do not exist are still listed; content references inside
/// `extra_directives` are included.
pub fn watched_paths(input_path: &Path, options: &CompilerOptions) -> Result<Vec<PathBuf>> {
    let document = source::load_document(input_path)?;
    let base_dir = options
        .base_dir
        .clone()
        .or_else(|| input_path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut paths = vec![input_path.to_path_buf()];

    let changes = options.changes_override.as_ref().or(match &document.changes {
        ChangesSource::Path(path) => Some(path),
        _ => None,
    });
    if let Some(changes) = changes {
        paths.push(base_dir.join(changes));
    }

    let mut raws: Vec<RawDirective> = match document.files {
        FileSection::Items(items) => items,
        _ => Vec::new(),
    };
    for fragment in &options.extra_directives {
        raws.push(source::parse_directive_fragment(fragment)?);
    }

    for raw in &raws {
        for (key, value) in &raw.entries {
            if let (Some(_), RawValue::Text(path)) = (ContentMode::from_key(key), value) {
                let path = base_dir.join(path);
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
    }

    Ok(paths)
}

/// Compile descriptor source text with default options, offline
pub fn compile_source(source: &str, filename: &str) -> Result<String> {
    let options = CompilerOptions {
        offline: true,
        ..CompilerOptions::default()
    };
    Ok(compile_source_with_options(source, filename, &options)?.text)
}

/// Compile descriptor source text with custom options
pub fn compile_source_with_options(source: &str, filename: &str, options: &CompilerOptions) -> Result<CompileOutput> {
    let document = source::parse_document(source, filename, SourceFormat::from_path(Path::new(filename)))?;
    let fetcher = options.fetcher()?;
    compile_document(document, options, fetcher.as_ref())
}

/// Run the whole pipeline over an already parsed document
pub fn compile_document(
    document: SourceDocument,
    options: &CompilerOptions,
    fetcher: &dyn ByteFetcher,
) -> Result<CompileOutput> {
    let start_time = Instant::now();
    let mut diagnostics = Diagnostics::new();
    let mut stats = CompilationStats::default();
    let base_dir = options.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    // Phase 1: macro table
    let mut macros = MacroTable::from_pairs(document.entities)?;
    for (name, value) in &options.macro_overrides {
        log::debug!("Macro override {}={}", name, value);
        macros.insert(name.clone(), value.clone())?;
    }
    if options.debug_mode {
        log::debug!("Phase 1 complete. Macros declared: {}", macros.len());
    }

    // Phase 2: derived macros
    let version_settings = VersionSettings {
        version_macro: options.version_macro.clone(),
        plugin_url_macro: options.plugin_url_macro.clone(),
        previous_version: options.previous_version.clone(),
        today: options.today.unwrap_or_else(|| chrono::Local::now().date_naive()),
    };
    stats.derived_version = VersionResolver::new(fetcher).derive(&mut macros, &version_settings, &mut diagnostics)?;

    let hash_settings = HashSettings {
        hash_macro: options.hash_macro.clone(),
        package_url_macro: options.package_url_macro.clone(),
        archive: options.archive.clone(),
        required: options.hash_required,
        base_dir: base_dir.clone(),
    };
    stats.derived_hash = HashResolver::new(fetcher).derive(&mut macros, &hash_settings, &mut diagnostics)?;

    // Phase 3: freeze
    macros.validate()?;
    let escaper = EntityAwareEscaper::from_table(&macros);
    stats.macro_count = macros.len();
    if options.debug_mode {
        log::debug!("Phase 3 complete. Macro table frozen with {} names", stats.macro_count);
    }

    // Phase 4: changelog
    let changes = match &options.changes_override {
        Some(path) => ChangesSource::Path(path.clone()),
        None => document.changes,
    };
    let changelog = read_changelog(&changes, &base_dir, &mut diagnostics)?;

    // Phase 5: directives
    let compiler = DirectiveCompiler::new(&escaper, &base_dir);
    let mut directives = Vec::new();
    let mut next_index = 0;

    match &document.files {
        FileSection::Items(items) => {
            for raw in items {
                directives.extend(compiler.compile_raw(raw, next_index, &mut diagnostics));
                next_index += 1;
            }
        }
        FileSection::Missing => log::debug!("No {} section", SECTION_FILE),
        FileSection::Invalid(message) => {
            diagnostics.recover(SECTION_FILE, &CompilerError::invalid_shape(SECTION_FILE, message.as_str()));
        }
    }

    for fragment in &options.extra_directives {
        let raw = source::parse_directive_fragment(fragment)?;
        directives.extend(compiler.compile_raw(&raw, next_index, &mut diagnostics));
        next_index += 1;
    }

    stats.directive_count = directives.len();
    stats.diagnostic_count = directives.iter().filter(|d| d.has_diagnostic()).count();
    if options.debug_mode {
        log::debug!("Phase 5 complete. Directives compiled: {}", stats.directive_count);
    }

    // Phase 6: assembly
    let document = PluginDocument {
        macros,
        changelog,
        directives,
    };
    let text = DocumentAssembler::new(options.pretty).assemble(&document, &mut diagnostics);

    stats.output_size = text.len() as u64;
    stats.warning_count = diagnostics.len();
    stats.compile_time_ms = start_time.elapsed().as_millis() as u64;

    Ok(CompileOutput {
        text,
        warnings: diagnostics.into_warnings(),
        stats,
    })
}

fn read_changelog(changes: &ChangesSource, base_dir: &Path, diagnostics: &mut Diagnostics) -> Result<String> {
    match changes {
        ChangesSource::Path(path) => {
            let full_path = base_dir.join(path);
            fs::read_to_string(&full_path).map_err(|e| CompilerError::FileNotFound {
                path: format!("changelog {}: {}", full_path.display(), e),
            })
        }
        ChangesSource::Missing => {
            diagnostics.warn(SECTION_CHANGES, "no changelog given; emitting an empty block");
            Ok(String::new())
        }
        ChangesSource::Invalid(message) => {
            diagnostics.recover(SECTION_CHANGES, &CompilerError::invalid_shape(SECTION_CHANGES, message.as_str()));
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;
    use quick_xml::Reader;
    use tempfile::TempDir;

    fn offline_options(dir: &Path) -> CompilerOptions {
        CompilerOptions {
            base_dir: Some(dir.to_path_buf()),
            offline: true,
            today: NaiveDate::from_ymd_opt(2026, 10, 18),
            ..CompilerOptions::default()
        }
    }

    fn assert_well_formed(text: &str) {
        let mut reader = Reader::from_str(text);
        reader.check_end_names(true);
        let mut depth = 0i32;
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(Event::Start(_)) => depth += 1,
                Ok(Event::End(_)) => depth -= 1,
                Ok(_) => {}
                Err(e) => panic!("output is not well-formed: {}\n{}", e, text),
            }
        }
        assert_eq!(depth, 0, "unbalanced elements in\n{}", text);
    }

    #[test]
    fn test_end_to_end_sample() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ok.txt"), "ok\n").unwrap();
        fs::write(dir.path().join("CHANGELOG.md"), "### 1.0\n- initial\n").unwrap();
        let source = format!(
            "ENTITIES:\n  name: sample\n  version: \"1.0\"\nCHANGES: CHANGELOG.md\nFILE:\n  - \"@Name\": a.sh\n    INLINE: {}\n",
            dir.path().join("ok.txt").display()
        );

        let output = compile_source_with_options(&source, "plugin.yaml", &offline_options(dir.path())).unwrap();
        let text = &output.text;

        assert!(text.contains("<!ENTITY name    \"sample\">\n<!ENTITY version \"1.0\">"));
        assert!(text.contains("<PLUGIN name=\"&name;\" version=\"&version;\">"));
        assert!(text.contains("<FILE Name=\"a.sh\">\n<INLINE>\nok\n</INLINE>\n</FILE>"));
        assert!(text.contains("<CHANGES>\n### 1.0\n- initial\n</CHANGES>"));
        assert!(output.warnings.is_empty());
        assert_eq!(output.stats.macro_count, 2);
        assert_eq!(output.stats.directive_count, 1);
        assert_eq!(output.stats.derived_version, None);
        assert_well_formed(text);
    }

    #[test]
    fn test_missing_content_file_stays_well_formed() {
        let dir = TempDir::new().unwrap();
        let source = "ENTITIES:\n  name: sample\n  version: \"1.0\"\nFILE:\n  - \"@Name\": a.sh\n    INLINE: nowhere.sh\n  - \"@Name\": b.sh\n    URL: \"https://example.com/&name;\"\n";

        let output = compile_source_with_options(source, "plugin.yaml", &offline_options(dir.path())).unwrap();
        assert!(output.text.contains("<!-- Error: INLINE file not found: nowhere.sh -->"));
        assert!(output.text.contains("<URL>https://example.com/&name;</URL>"));
        assert_eq!(output.stats.diagnostic_count, 1);
        // One for the empty changelog, one for the missing file
        assert_eq!(output.warnings.len(), 2);
        assert_well_formed(&output.text);
    }

    #[test]
    fn test_both_content_markers_warn_and_later_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("v.sh"), "verbatim <x>").unwrap();
        fs::write(dir.path().join("e.sh"), "escaped <x>").unwrap();
        fs::write(dir.path().join("CHANGES.md"), "notes").unwrap();
        let source = "ENTITIES:\n  name: sample\n  version: \"1.0\"\nCHANGES:\n  File: CHANGES.md\nFILE:\n  - \"@Name\": both\n    CDATA: v.sh\n    INLINE: e.sh\n";

        let output = compile_source_with_options(source, "plugin.yaml", &offline_options(dir.path())).unwrap();
        assert!(output.text.contains("<INLINE>\nescaped &lt;x&gt;\n</INLINE>"));
        assert!(!output.text.contains("verbatim"));
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].scope, "FILE item with @Name='both'");
    }

    #[test]
    fn test_comments_carried_over_in_order() {
        let dir = TempDir::new().unwrap();
        let source = "ENTITIES:\n  name: sample\n  version: \"1.0\"\nFILE:\n  # Package\n  - \"@Name\": /boot/pkg.txz\n    URL: \"&name;.txz\"\n  - # Cleanup follows\n  - \"@Name\": /tmp/x\n    \"@Mode\": \"0755\"\n";

        let output = compile_source_with_options(source, "plugin.yaml", &offline_options(dir.path())).unwrap();
        let package = output.text.find("<!-- Package -->\n<FILE Name=\"/boot/pkg.txz\">").unwrap();
        let note = output.text.find("<!-- Cleanup follows -->\n\n<FILE Name=\"/tmp/x\" Mode=\"0755\" />").unwrap();
        assert!(package < note);
        assert_eq!(output.stats.directive_count, 3);
        assert_well_formed(&output.text);
    }

    #[test]
    fn test_overrides_and_extra_directives() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("other.md"), "other notes").unwrap();
        let mut options = offline_options(dir.path());
        options.macro_overrides = vec![
            ("version".to_string(), "2.0".to_string()),
            ("author".to_string(), "someone".to_string()),
        ];
        options.changes_override = Some("other.md".to_string());
        options.extra_directives = vec![r#"{"@Name": "/tmp/extra", URL: "&author;"}"#.to_string()];

        let source = "ENTITIES:\n  name: sample\n  version: \"1.0\"\nCHANGES: missing.md\n";
        let output = compile_source_with_options(source, "plugin.yaml", &options).unwrap();

        assert!(output.text.contains("<!ENTITY version \"2.0\">\n<!ENTITY author  \"someone\">"));
        assert!(output.text.contains("<CHANGES>\nother notes\n</CHANGES>"));
        assert!(output.text.contains("<FILE Name=\"/tmp/extra\">\n<URL>&author;</URL>\n</FILE>"));
    }

    #[test]
    fn test_version_is_derived_when_absent() {
        let dir = TempDir::new().unwrap();
        let mut options = offline_options(dir.path());
        options.previous_version = Some("2026.10.18c".to_string());

        let output = compile_source_with_options("ENTITIES:\n  name: sample\n", "plugin.yaml", &options).unwrap();
        assert_eq!(output.stats.derived_version.as_deref(), Some("2026.10.18d"));
        assert!(output.text.contains("<!ENTITY version \"2026.10.18d\">"));
        assert!(output.text.contains("version=\"&version;\""));
    }

    #[test]
    fn test_hash_failure_offline_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let source = "ENTITIES:\n  name: sample\n  version: \"1.0\"\n  packageURL: \"https://example.com/&name;.txz\"\nCHANGES: c.md\n";
        fs::write(dir.path().join("c.md"), "x").unwrap();

        let output = compile_source_with_options(source, "plugin.yaml", &offline_options(dir.path())).unwrap();
        assert_eq!(output.stats.derived_hash, None);
        assert!(!output.text.contains("<!ENTITY MD5"));
        assert_eq!(output.warnings.len(), 1);

        let mut options = offline_options(dir.path());
        options.hash_required = true;
        assert!(matches!(
            compile_source_with_options(source, "plugin.yaml", &options),
            Err(CompilerError::Network { .. })
        ));
    }

    #[test]
    fn test_fatal_errors() {
        let dir = TempDir::new().unwrap();
        let options = offline_options(dir.path());

        let result = compile_source_with_options("FILE: []\n", "plugin.yaml", &options);
        assert!(matches!(result, Err(CompilerError::MissingSection { .. })));

        let result = compile_source_with_options("ENTITIES:\n  version: \"1\"\nCHANGES: gone.md\n", "plugin.yaml", &options);
        assert!(matches!(result, Err(CompilerError::FileNotFound { .. })));

        let result = compile_source_with_options("ENTITIES:\n  version: \"&a;\"\n  a: \"&version;\"\n", "plugin.yaml", &options);
        assert!(matches!(result, Err(CompilerError::CircularReference { .. })));

        let result = compile_source_with_options("ENTITIES:\n  version: \"&nope;\"\n", "plugin.yaml", &options);
        assert!(matches!(result, Err(CompilerError::UnresolvedReference { .. })));
    }

    #[test]
    fn test_invalid_file_section_is_recovered() {
        let dir = TempDir::new().unwrap();
        let output = compile_source_with_options(
            "ENTITIES:\n  version: \"1\"\nFILE:\n  URL: x\n",
            "plugin.yaml",
            &offline_options(dir.path()),
        )
        .unwrap();
        assert!(output.text.ends_with("</CHANGES>\n\n</PLUGIN>\n"));
        assert!(output.warnings.iter().any(|w| w.scope == SECTION_FILE));
    }

    #[test]
    fn test_toml_document() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("CHANGELOG.md"), "notes").unwrap();
        let source = "[ENTITIES]\nname = \"sample\"\nversion = \"1.0\"\n\n[CHANGES]\nFile = \"CHANGELOG.md\"\n\n# Settings page\n[[FILE]]\nURL = \"&name;\"\n[FILE.Attr]\nName = \"/boot/x.page\"\n";

        let output = compile_source_with_options(source, "plugin.toml", &offline_options(dir.path())).unwrap();
        assert!(output.text.contains("<!-- Settings page -->\n<FILE Name=\"/boot/x.page\">\n<URL>&name;</URL>\n</FILE>"));
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_compile_file_writes_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("plugin.yaml");
        let output = dir.path().join("plugin.plg");
        fs::write(dir.path().join("CHANGELOG.md"), "notes").unwrap();
        fs::write(&input, "ENTITIES:\n  name: sample\n  version: \"1.0\"\nCHANGES: CHANGELOG.md\n").unwrap();

        let options = CompilerOptions {
            offline: true,
            ..CompilerOptions::default()
        };
        let stats = compile_file_with_options(input.to_str().unwrap(), output.to_str().unwrap(), options).unwrap();

        let written = fs::read_to_string(&output).unwrap();
        assert_eq!(stats.output_size, written.len() as u64);
        assert!(written.contains("<CHANGES>\nnotes\n</CHANGES>"));
    }

    #[test]
    fn test_watched_paths_cover_every_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("plugin.yaml");
        fs::write(
            &input,
            "ENTITIES:\n  version: \"1\"\nCHANGES: CHANGELOG.md\nFILE:\n  - INLINE: a.sh\n  - CDATA: b.sh\n    INLINE: a.sh\n  - URL: x\n",
        )
        .unwrap();

        let mut options = offline_options(dir.path());
        options.extra_directives = vec!["{CDATA: extra.sh}".to_string()];
        let paths = watched_paths(&input, &options).unwrap();
        assert_eq!(
            paths,
            vec![
                input.clone(),
                dir.path().join("CHANGELOG.md"),
                dir.path().join("a.sh"),
                dir.path().join("b.sh"),
                dir.path().join("extra.sh"),
            ]
        );

        options.changes_override = Some("NEWS.md".to_string());
        assert_eq!(watched_paths(&input, &options).unwrap()[1], dir.path().join("NEWS.md"));
    }

    #[test]
    fn test_toml_float_macros_render_as_written() {
        let dir = TempDir::new().unwrap();
        let output = compile_source_with_options(
            "[ENTITIES]\nname = \"x\"\nversion = 1.0\nrev = 1.10\n",
            "p.toml",
            &offline_options(dir.path()),
        )
        .unwrap();
        assert!(output.text.contains("<!ENTITY version \"1.0\">\n<!ENTITY rev     \"1.10\">"));
    }

    #[test]
    fn test_compile_source_default_options() {
        let text = compile_source("ENTITIES:\n  version: \"1\"\n", "plugin.yaml").unwrap();
        assert!(text.starts_with(XML_DECLARATION));
        assert!(text.ends_with("</PLUGIN>\n"));
    }

    #[test]
    fn test_compiler_options_default() {
        let options = CompilerOptions::default();
        assert!(!options.debug_mode);
        assert!(!options.pretty);
        assert!(!options.hash_required);
        assert_eq!(options.version_macro, "version");
        assert_eq!(options.hash_macro, "MD5");
        assert_eq!(options.fetch_retries, DEFAULT_FETCH_RETRIES);
        assert!(options.macro_overrides.is_empty());
    }
}
