//! Interactive yes/no prompt on stdin.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// `y`/`yes` (any case) is yes; everything else, including empty input, is no.
pub fn parse_yes_no(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask `question [y/N]` and read one line. End of input counts as no.
pub fn ask_yes_no(question: &str) -> Result<bool> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{question} [y/N] ")?;
    stdout.flush()?;
    drop(stdout);

    let mut line = String::new();
    let n = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read answer from stdin")?;
    if n == 0 {
        println!();
        return Ok(false);
    }
    Ok(parse_yes_no(&line))
}
