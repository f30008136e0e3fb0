// FILE: src/cli/handlers.rs
use crate::{
    compile_file_with_options, compile_path, watched_paths, CompilationStats, CompilerError, CompilerOptions, Result,
};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::thread;
use std::time::Duration;

// --- COMPILE ---
pub fn handle_compile_command(cli: &super::Cli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = matches
        .get_one::<String>("input")
        .ok_or_else(|| CompilerError::InvalidFormat {
            message: "No input descriptor given".to_string(),
        })?;
    let output_path = matches.get_one::<String>("output").cloned();

    let options = cli.build_compiler_options(matches)?;

    if matches.get_flag("watch") {
        let output_path = output_path.unwrap_or_else(|| {
            Path::new(input_path)
                .with_extension("plg")
                .to_string_lossy()
                .into_owned()
        });
        watch_and_compile(input_path, &output_path, options)
    } else {
        compile_single_file(input_path, output_path.as_deref(), options, matches.get_flag("stats"))
    }
}

fn compile_single_file(
    input_path: &str,
    output_path: Option<&str>,
    options: CompilerOptions,
    show_stats: bool,
) -> Result<()> {
    let fetcher = options.fetcher()?;
    let output = compile_path(Path::new(input_path), &options, fetcher.as_ref())?;

    match output_path {
        Some(output_path) => {
            fs::write(output_path, &output.text)?;
            println!("🔨 Compiled {} -> {}", input_path, output_path);
            println!("✅ Compilation successful!");
            println!("   Output: {} bytes", output.stats.output_size);
            println!("   Time: {}ms", output.stats.compile_time_ms);
            if !output.warnings.is_empty() {
                println!("   ⚠️  Warnings: {}", output.warnings.len());
            }
            if show_stats {
                println!("{}", stats_json(&output.stats)?);
            }
        }
        None => {
            // stdout carries the document; everything else goes to stderr
            print!("{}", output.text);
            if show_stats {
                eprintln!("{}", stats_json(&output.stats)?);
            }
        }
    }

    Ok(())
}

fn watch_and_compile(input_path: &str, output_path: &str, options: CompilerOptions) -> Result<()> {
    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) if !event.kind.is_access() => {
                let _ = tx.send(event);
            }
            Ok(_) => {}
            Err(e) => eprintln!("Watch error: {}", e),
        },
        notify::Config::default(),
    )
    .map_err(|e| watch_error("Failed to create file watcher", e))?;

    let mut watched = HashSet::new();
    let input = Path::new(input_path);
    rebuild(input_path, output_path, &options, "Initial compilation");
    watch_dependencies(&mut watcher, &mut watched, input, &options)?;
    if !watched.contains(input) {
        return Err(CompilerError::FileNotFound {
            path: input_path.to_string(),
        });
    }
    println!("👀 Watching {} file(s) for changes...", watched.len());

    while rx.recv().is_ok() {
        // One save often fires several events
        thread::sleep(Duration::from_millis(WATCH_DEBOUNCE_MS));
        while rx.try_recv().is_ok() {}

        println!("🔄 Input changed, recompiling...");
        rebuild(input_path, output_path, &options, "Recompilation");
        watch_dependencies(&mut watcher, &mut watched, input, &options)?;
    }

    Ok(())
}

const WATCH_DEBOUNCE_MS: u64 = 100;

fn rebuild(input_path: &str, output_path: &str, options: &CompilerOptions, label: &str) {
    match compile_file_with_options(input_path, output_path, options.clone()) {
        Ok(stats) => println!(
            "✅ {} successful ({} bytes, {}ms, {} warnings)",
            label, stats.output_size, stats.compile_time_ms, stats.warning_count
        ),
        Err(e) => eprintln!("❌ {} failed: {}", label, e),
    }
}

/// Start watching files the descriptor references that are not watched yet
fn watch_dependencies(
    watcher: &mut RecommendedWatcher,
    watched: &mut HashSet<PathBuf>,
    input: &Path,
    options: &CompilerOptions,
) -> Result<()> {
    let paths = match watched_paths(input, options) {
        Ok(paths) => paths,
        Err(e) => {
            log::warn!("Cannot list inputs of {}: {}", input.display(), e);
            vec![input.to_path_buf()]
        }
    };

    for path in paths {
        if watched.contains(&path) {
            continue;
        }
        if !path.exists() {
            log::debug!("Not watching missing file {}", path.display());
            continue;
        }
        match watcher.watch(&path, RecursiveMode::NonRecursive) {
            Ok(()) => {
                log::info!("Watching {}", path.display());
                watched.insert(path);
            }
            Err(e) if path == input => return Err(watch_error("Failed to watch file", e)),
            Err(e) => log::warn!("Cannot watch {}: {}", path.display(), e),
        }
    }
    Ok(())
}

fn watch_error(context: &str, e: notify::Error) -> CompilerError {
    CompilerError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("{}: {}", context, e),
    ))
}

// --- HELPERS ---
fn stats_json(stats: &CompilationStats) -> Result<String> {
    serde_json::to_string_pretty(stats).map_err(|e| CompilerError::InvalidFormat {
        message: format!("JSON serialization error: {}", e),
    })
}
