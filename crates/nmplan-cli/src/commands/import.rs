use super::EXIT_SUCCESS;
use nmplan_core::ImportOutcome;
use std::io::{self, Write};

/// Print the written file name, unframed, for the calling process to capture.
pub fn report(outcome: &ImportOutcome) -> io::Result<u8> {
    write_filename(&mut io::stdout().lock(), &outcome.filename)?;
    Ok(EXIT_SUCCESS)
}

fn write_filename<W: Write>(out: &mut W, filename: &str) -> io::Result<()> {
    write!(out, "{filename}")?;
    out.flush()
}
