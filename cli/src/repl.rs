//! Line-at-a-time interactive loop.

use std::io::{self, BufRead, Write};

use reqsh_core::Session;

pub const PROMPT: &str = "reqsh> ";

pub const BANNER: &str = "reqsh: scriptable HTTP request shell\n\
                          Type help() for the command list, exit or quit to leave.";

/// Evaluate lines from `input` until EOF, `exit` or `quit`.
///
/// Script errors go to `err` and the loop continues; only I/O failures on
/// the loop's own streams end it early.
pub fn run(
    session: &mut Session,
    input: impl BufRead,
    mut out: impl Write,
    mut err: impl Write,
) -> io::Result<()> {
    writeln!(out, "{BANNER}")?;

    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next().transpose()? else {
            writeln!(out)?;
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            writeln!(out, "Bye.")?;
            break;
        }

        if let Err(e) = session.eval(line) {
            tracing::debug!(%line, "evaluation failed");
            writeln!(err, "error: {e}")?;
        }
    }
    Ok(())
}
