use std::io::{self, BufRead, Write};

use anyhow::Result;
use minijs::{Engine, Interpreter};

const BANNER: &str = "minijs REPL. Ctrl-D to exit.";

/// Reads one line at a time and runs it against a single interpreter, so declarations
/// persist between lines.
pub fn start() -> Result<()> {
    let mut interpreter = Interpreter::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    println!("{}", BANNER);
    loop {
        print!(">> ");
        io::stdout().flush()?;

        let input = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        if input.trim().is_empty() {
            continue;
        }

        match interpreter.run(&input) {
            Ok(rendered) => println!("{}", rendered),
            Err(error) => {
                log::debug!("evaluation failed: {:?}", error);
                println!("{}", error);
            }
        }
    }
    println!();
    Ok(())
}
