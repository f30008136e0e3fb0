//! Date-based version derivation
//!
//! Versions are the build date (`2026.10.18`); a second build on the same day
//! gets a single letter suffix (`2026.10.18a`, `2026.10.18b`, ...).

use crate::error::{CompilerError, Diagnostics, Result};
use crate::fetch::ByteFetcher;
use crate::macro_table::MacroTable;
use crate::types::{FIRST_VERSION_SUFFIX, MAX_DESCRIPTOR_SIZE, VERSION_DATE_FORMAT};
use chrono::NaiveDate;
use regex::Regex;
use std::io::Read;

/// Inputs for version derivation
#[derive(Debug, Clone)]
pub struct VersionSettings {
    pub version_macro: String,
    pub plugin_url_macro: String,
    /// Previously published version, when known without a fetch
    pub previous_version: Option<String>,
    pub today: NaiveDate,
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(VERSION_DATE_FORMAT).to_string()
}

fn bump_letter(letter: char) -> char {
    match letter {
        'z' => 'a',
        'Z' => 'A',
        other => (other as u8 + 1) as char,
    }
}

/// Compute the next version from the previously published one
pub fn next_version(previous: Option<&str>, today: NaiveDate) -> Result<String> {
    let date = format_date(today);

    let previous = match previous.map(str::trim) {
        Some(previous) if !previous.is_empty() => previous,
        _ => return Ok(date),
    };

    if previous == date {
        return Ok(format!("{}{}", date, FIRST_VERSION_SUFFIX));
    }

    let suffix = match previous.strip_prefix(date.as_str()) {
        Some(suffix) => suffix,
        None => return Ok(date),
    };

    let mut chars = suffix.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            if letter == 'z' || letter == 'Z' {
                log::warn!("Version suffix '{}' wraps around to '{}'", letter, bump_letter(letter));
            }
            Ok(format!("{}{}", date, bump_letter(letter)))
        }
        _ => Err(CompilerError::version(format!(
            "previous version '{}' has suffix '{}'; only a single trailing letter can be incremented",
            previous, suffix
        ))),
    }
}

/// Pull a macro declaration's value out of a published descriptor
pub fn extract_declared_value(descriptor: &str, macro_name: &str) -> Option<String> {
    let pattern = format!(r#"<!ENTITY\s+{}\s+"([^"]*)"\s*>"#, regex::escape(macro_name));
    let regex = Regex::new(&pattern).ok()?;
    regex
        .captures(descriptor)
        .map(|captures| captures[1].trim().to_string())
}

/// Derives the version macro when the document does not declare one
pub struct VersionResolver<'a> {
    fetcher: &'a dyn ByteFetcher,
}

impl<'a> VersionResolver<'a> {
    pub fn new(fetcher: &'a dyn ByteFetcher) -> Self {
        Self { fetcher }
    }

    /// Insert a derived version into `table`; returns the derived value, if any
    pub fn derive(
        &self,
        table: &mut MacroTable,
        settings: &VersionSettings,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<String>> {
        if table.contains(&settings.version_macro) {
            log::debug!("Version macro '{}' declared explicitly", settings.version_macro);
            return Ok(None);
        }

        let previous = match &settings.previous_version {
            Some(previous) => Some(previous.clone()),
            None => self.published_version(table, settings, diagnostics)?,
        };

        let version = next_version(previous.as_deref(), settings.today)?;
        log::info!("Auto-generated {}: {}", settings.version_macro, version);
        table.insert(settings.version_macro.clone(), version.clone())?;
        Ok(Some(version))
    }

    fn published_version(
        &self,
        table: &MacroTable,
        settings: &VersionSettings,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<String>> {
        if !table.contains(&settings.plugin_url_macro) {
            return Ok(None);
        }
        let url = table.resolve(&settings.plugin_url_macro)?;

        let descriptor = match self.fetch_text(&url) {
            Ok(text) => text,
            Err(e) => {
                diagnostics.recover(settings.version_macro.as_str(), &e);
                return Ok(None);
            }
        };

        let previous = extract_declared_value(&descriptor, &settings.version_macro);
        if previous.is_none() {
            diagnostics.warn(
                settings.version_macro.as_str(),
                format!("published descriptor at {} declares no '{}'", url, settings.version_macro),
            );
        }
        Ok(previous)
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        let reader = self.fetcher.fetch(url)?;
        let mut text = String::new();
        reader
            .take(MAX_DESCRIPTOR_SIZE)
            .read_to_string(&mut text)
            .map_err(|e| CompilerError::network(url, e.to_string()))?;
        Ok(text)
    }
}
