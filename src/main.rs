mod repl;

use std::{fs, path::PathBuf, process, thread};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{LevelFilter, Log, Metadata, Record};
use minijs::{inspect, Interpreter, InterpreterConfig};

/// Deep JavaScript recursion maps onto Rust recursion, so the interpreter runs on a thread
/// with a larger stack than the main thread gets.
const STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// run a file
    Run {
        #[arg(name = "FILE")]
        file: PathBuf,
    },
    /// evaluate a snippet and print its value
    Eval {
        #[arg(name = "CODE")]
        code: String,
    },
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn run(command: Option<Commands>) -> Result<()> {
    match command {
        Some(Commands::Run { file }) => {
            let source = fs::read_to_string(&file)
                .with_context(|| format!("could not read {}", file.display()))?;
            let mut interpreter = Interpreter::with_config(InterpreterConfig {
                filename: file.display().to_string(),
                ..InterpreterConfig::default()
            });
            interpreter.interpret(&source)?;
        }
        Some(Commands::Eval { code }) => {
            let mut interpreter = Interpreter::new();
            let value = interpreter.interpret(&code)?;
            println!("{}", inspect(&value));
        }
        None => repl::start()?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }

    let worker = thread::Builder::new()
        .name("minijs".to_string())
        .stack_size(STACK_SIZE)
        .spawn(move || run(cli.command));
    let result = match worker {
        Ok(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(anyhow::anyhow!("interpreter thread panicked"))),
        Err(error) => Err(error.into()),
    };

    if let Err(error) = result {
        eprintln!("{}", error);
        process::exit(1);
    }
}
