//! Plugin Descriptor Compiler Binary

use plgc::cli::Cli;
use plgc::CompilerError;
use std::process;

fn main() {
    match Cli::new().run() {
        Ok(()) => {}
        Err(CompilerError::Io(e)) => {
            eprintln!("IO Error: {}", e);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Compilation failed: {}", e);
            process::exit(1);
        }
    }
}
