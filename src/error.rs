//! Error types for the plugin descriptor compiler

use thiserror::Error;

/// A recovered failure, kept for the caller after the run completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// What the warning is about, e.g. `FILE item with @Name='a.sh'` or `CHANGES`
    pub scope: String,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.scope, self.message)
    }
}

/// Append-only warning sink shared by every phase of a compile run
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and mirror it to the log
    pub fn warn(&mut self, scope: impl Into<String>, message: impl Into<String>) {
        let warning = Warning {
            scope: scope.into(),
            message: message.into(),
        };
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Record a recoverable error as a warning
    pub fn recover(&mut self, scope: impl Into<String>, error: &CompilerError) {
        self.warn(scope, error.to_string());
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Required section '{section}' is missing")]
    MissingSection { section: String },

    #[error("Invalid shape for '{section}': {message}")]
    InvalidShape { section: String, message: String },

    #[error("Macro '{name}' references undefined macro '{reference}'")]
    UnresolvedReference { name: String, reference: String },

    #[error("Circular macro reference detected: {chain}")]
    CircularReference { name: String, chain: String },

    #[error("Cannot read content file '{path}': {message}")]
    ContentRead { path: String, message: String },

    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Archive build error: {message}")]
    Build { message: String },

    #[error("Archive builder '{command}' exited with {status}")]
    BuildExit { command: String, status: String },

    #[error("Version error: {message}")]
    Version { message: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn missing_section(section: impl Into<String>) -> Self {
        Self::MissingSection {
            section: section.into(),
        }
    }

    pub fn invalid_shape(section: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidShape {
            section: section.into(),
            message: message.into(),
        }
    }

    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    pub fn version(message: impl Into<String>) -> Self {
        Self::Version {
            message: message.into(),
        }
    }

    /// Errors in the derivation steps that a compile may survive by omitting the derived macro
    pub fn is_recoverable_derivation(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Build { .. })
    }
}
