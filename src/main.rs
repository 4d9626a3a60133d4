use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use ednjit::{Engine, Error};

#[derive(Parser, Debug)]
#[command(
    name = "ednjit",
    about = "JIT runner for a small statically-typed EDN dialect",
    version
)]
struct Cli {
    /// Source files to execute; only the first one runs
    #[arg(short = 'f', long = "filename")]
    filename: Vec<PathBuf>,
    /// Log filter (trace|debug|info|warn|error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    ednjit::logging::init(&cli.log_level);

    let Some(path) = cli.filename.first() else {
        eprintln!("No filename provided.");
        return ExitCode::FAILURE;
    };
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to open file: {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut engine = Engine::new();
    match engine.run(&source) {
        Ok(output) => {
            println!("===== Generated IR =====");
            println!("{}", output.ir);
            println!("========================");
            println!("JIT result: {}", output.value);
            ExitCode::SUCCESS
        }
        Err(Error::Compile(diag)) => {
            eprintln!("{}", diag.with_path(path.display().to_string()));
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
