// FILE: src/cli/mod.rs

mod config;
mod handlers;

use crate::error::{CompilerError, Result};
use crate::CompilerOptions;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::time::Instant;

pub use config::ConfigFile;

pub struct Cli {
    config: ConfigFile,
    start_time: Instant,
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

impl Cli {
    pub fn new() -> Self {
        Self {
            config: ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        self.setup_logging(matches.get_count("verbose"))?;
        log::debug!("Arguments parsed in {}ms", self.start_time.elapsed().as_millis());

        handlers::handle_compile_command(self, &matches)
    }

    fn setup_logging(&self, verbose_count: u8) -> Result<()> {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
        Ok(())
    }

    /// Merge command-line flags over the config file into compiler options
    pub fn build_compiler_options(&self, matches: &clap::ArgMatches) -> Result<CompilerOptions> {
        let mut options = CompilerOptions {
            debug_mode: matches.get_count("verbose") >= 2,
            ..CompilerOptions::default()
        };

        options.base_dir = matches
            .get_one::<String>("base-dir")
            .or(self.config.base_dir.as_ref())
            .map(PathBuf::from);

        if let Some(defines) = matches.get_many::<String>("define") {
            for define in defines {
                options.macro_overrides.push(parse_define(define)?);
            }
        }
        if let Some(config_macros) = &self.config.macros {
            for (key, value) in config_macros {
                if !options.macro_overrides.iter().any(|(name, _)| name == key) {
                    options.macro_overrides.push((key.clone(), value.clone()));
                }
            }
        }

        options.changes_override = matches
            .get_one::<String>("changes")
            .or(self.config.changes.as_ref())
            .cloned();

        if let Some(fragments) = matches.get_many::<String>("file") {
            options.extra_directives.extend(fragments.cloned());
        }

        options.previous_version = matches.get_one::<String>("previous-version").cloned();
        options.archive = self.config.archive.clone();
        options.hash_required = matches.get_flag("require-hash") || self.config.hash_required.unwrap_or(false);
        options.pretty = matches.get_flag("pretty") || self.config.pretty.unwrap_or(false);
        options.offline = matches.get_flag("offline") || self.config.offline.unwrap_or(false);

        if let Some(timeout) = self.config.fetch_timeout_secs {
            options.fetch_timeout_secs = timeout;
        }
        if let Some(retries) = self.config.fetch_retries {
            options.fetch_retries = retries;
        }

        Ok(options)
    }
}

fn build_cli() -> Command {
    Command::new(crate::NAME)
        .version(crate::VERSION)
        .about(crate::DESCRIPTION)
        .author("plgc Development Team")
        .arg(Arg::new("input").help("Input descriptor (.yaml or .toml)").required(true).index(1))
        .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Output PLG file (default: stdout)"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity (can be used multiple times)")
                .action(ArgAction::Count),
        )
        .arg(Arg::new("define").short('D').long("define").value_name("KEY=VALUE").help("Define or replace a macro").action(ArgAction::Append))
        .arg(Arg::new("changes").long("changes").value_name("FILE").help("Changelog file, replacing the document's CHANGES"))
        .arg(Arg::new("file").long("file").value_name("MAPPING").help("Extra FILE directive as an inline YAML mapping").action(ArgAction::Append))
        .arg(Arg::new("base-dir").long("base-dir").value_name("DIR").help("Directory relative paths are resolved against"))
        .arg(Arg::new("previous-version").long("previous-version").value_name("VERSION").help("Previously published version, instead of fetching it"))
        .arg(Arg::new("require-hash").long("require-hash").help("Fail when the package hash cannot be derived").action(ArgAction::SetTrue))
        .arg(Arg::new("pretty").long("pretty").help("Indent the output").action(ArgAction::SetTrue))
        .arg(Arg::new("offline").long("offline").help("Never touch the network").action(ArgAction::SetTrue))
        .arg(Arg::new("stats").long("stats").help("Print compilation statistics as JSON").action(ArgAction::SetTrue))
        .arg(Arg::new("watch").short('w').long("watch").help("Watch for file changes and recompile").action(ArgAction::SetTrue))
}

fn parse_define(define: &str) -> Result<(String, String)> {
    match define.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(CompilerError::InvalidFormat {
            message: format!("Invalid macro definition: {}. Use KEY=VALUE format.", define),
        }),
    }
}
