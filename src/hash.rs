//! Content hash derivation for the package artifact
//!
//! The hash is taken either from the bytes at the package URL or from the
//! output of a locally run archive builder. Both paths stream through an MD5
//! context instead of buffering the artifact.

use crate::error::{CompilerError, Diagnostics, Result};
use crate::fetch::ByteFetcher;
use crate::macro_table::MacroTable;
use crate::types::STREAM_BUFFER_SIZE;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

/// External archive build step; `args` and `output` may contain macro references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub output: String,
}

/// Inputs for hash derivation
#[derive(Debug, Clone)]
pub struct HashSettings {
    pub hash_macro: String,
    pub package_url_macro: String,
    pub archive: Option<ArchiveSpec>,
    /// Failure to derive the hash aborts the compile instead of omitting the macro
    pub required: bool,
    /// Working directory for the archive builder and root for a relative output path
    pub base_dir: PathBuf,
}

/// Hex MD5 of everything `reader` yields
pub fn md5_stream<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut context = md5::Context::new();
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        context.consume(&buffer[..bytes_read]);
    }
    Ok(hex::encode(context.compute().0))
}

/// Derives the hash macro when the document does not declare one
pub struct HashResolver<'a> {
    fetcher: &'a dyn ByteFetcher,
}

impl<'a> HashResolver<'a> {
    pub fn new(fetcher: &'a dyn ByteFetcher) -> Self {
        Self { fetcher }
    }

    /// Insert a derived hash into `table`; returns the derived value, if any
    pub fn derive(
        &self,
        table: &mut MacroTable,
        settings: &HashSettings,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<String>> {
        if table.contains(&settings.hash_macro) {
            log::debug!("Hash macro '{}' declared explicitly", settings.hash_macro);
            return Ok(None);
        }

        let attempt = match &settings.archive {
            Some(spec) => self.hash_archive(table, spec, &settings.base_dir),
            None if table.contains(&settings.package_url_macro) => {
                let url = table.resolve(&settings.package_url_macro)?;
                self.hash_url(&url)
            }
            None => {
                log::debug!(
                    "No '{}' macro and no archive builder; skipping hash derivation",
                    settings.package_url_macro
                );
                return Ok(None);
            }
        };

        match attempt {
            Ok(digest) => {
                log::info!("Auto-generated {}: {}", settings.hash_macro, digest);
                table.insert(settings.hash_macro.clone(), digest.clone())?;
                Ok(Some(digest))
            }
            Err(e) if e.is_recoverable_derivation() && !settings.required => {
                diagnostics.recover(settings.hash_macro.as_str(), &e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Hash the bytes served at `url`
    pub fn hash_url(&self, url: &str) -> Result<String> {
        log::info!("Downloading {} to calculate hash...", url);
        let reader = self.fetcher.fetch(url)?;
        md5_stream(reader).map_err(|e| CompilerError::network(url, e.to_string()))
    }

    /// Run the archive builder, then hash the artifact it produced
    pub fn hash_archive(&self, table: &MacroTable, spec: &ArchiveSpec, base_dir: &Path) -> Result<String> {
        let args = spec
            .args
            .iter()
            .map(|arg| table.resolve_text(arg))
            .collect::<Result<Vec<_>>>()?;
        let output = base_dir.join(table.resolve_text(&spec.output)?);

        log::info!("Building archive: {} {}", spec.command, args.join(" "));
        let result = Command::new(&spec.command)
            .args(&args)
            .current_dir(base_dir)
            .output()
            .map_err(|e| CompilerError::build(format!("failed to run '{}': {}", spec.command, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            if !stderr.trim().is_empty() {
                log::error!("{} stderr:\n{}", spec.command, stderr.trim_end());
            }
            return Err(CompilerError::BuildExit {
                command: spec.command.clone(),
                status: result.status.to_string(),
            });
        }

        let file = File::open(&output).map_err(|e| {
            CompilerError::build(format!("cannot open archive '{}': {}", output.display(), e))
        })?;
        md5_stream(file).map_err(|e| CompilerError::build(format!("cannot read archive '{}': {}", output.display(), e)))
    }
}
