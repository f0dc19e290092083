//! Handles all user-facing output for the CLI that is not the live table.

use std::{
    io::{self, Write},
    path::Path,
};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::test::Test;

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Prints one line per target with its final label, after a run.
pub fn print_run_summary(test: &Test, run: usize, color: ColorChoice) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(color);
    stdout.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(stdout, "Run {} complete: {}", run, test.state())?;
    stdout.reset()?;
    for target in test.targets() {
        let outcome = test.target_state(target);
        let look = test.style().look(outcome);
        write!(stdout, "  {:<20} ", display_name(target.name()))?;
        stdout.set_color(
            ColorSpec::new()
                .set_bg(Some(look.background))
                .set_fg(Some(look.foreground))
                .set_bold(true),
        )?;
        write!(stdout, " {} ", look.label)?;
        stdout.reset()?;
        writeln!(stdout)?;
    }
    stdout.flush()
}

pub fn print_key_paths(public: &Path, secret: &Path, color: ColorChoice) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(color);
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(stdout, "public key")?;
    stdout.reset()?;
    writeln!(stdout, "  {}  (install on stations)", public.display())?;
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    write!(stdout, "secret key")?;
    stdout.reset()?;
    writeln!(stdout, "  {}  (keep off stations)", secret.display())
}

/// Writes rows to stdout as CSV.
pub fn print_csv(rows: &[Vec<String>]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "(unnamed)"
    } else {
        name
    }
}
