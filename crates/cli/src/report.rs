//! Colored console output for apkdiff
//!
//! Renders a comparison as:
//! ```text
//! Size difference in bytes ([*1] apk1 only, [*2] apk2 only):
//!   +         200 lib/arm64-v8a/libapp.so
//!   +          50 assets/new.txt *2
//! Summary:
//!   +         250 Package size difference
//! ```

use std::io::Write as _;

use color_eyre::Result;
use console::{Style, Term};

use apkdiff_core::report::{REPORT_HEADER, format_delta};
use apkdiff_core::{EntryDelta, ReportSink, Snapshot};

const NAME: &str = "apkdiff";

fn delta_style(delta: i64) -> Style {
    if delta > 0 {
        Style::new().red()
    } else {
        Style::new().green()
    }
}

/// Print `Error: apkdiff: <message>` to stderr
pub fn error(message: &str) {
    let mut term = Term::stderr();
    let style = Style::new().red();
    let _ = writeln!(term, "{}", style.apply_to(format!("Error: {NAME}: {message}")));
}

/// Print `Warning: apkdiff: <message>` to stderr
pub fn warning(message: &str) {
    let mut term = Term::stderr();
    let style = Style::new().yellow();
    let _ = writeln!(
        term,
        "{}",
        style.apply_to(format!("Warning: {NAME}: {message}"))
    );
}

/// Report sink writing to stdout
pub struct ConsoleReport {
    term: Term,
    verbose: bool,
}

impl ConsoleReport {
    pub fn new(verbose: bool) -> Self {
        Self {
            term: Term::stdout(),
            verbose,
        }
    }

    fn difference(&mut self, label: &str, delta: i64, marker: Option<&str>) -> Result<()> {
        let style = delta_style(delta);
        write!(self.term, "  {}", style.apply_to(format_delta(delta)))?;
        write!(self.term, " {}", Style::new().dim().apply_to(label))?;
        match marker {
            Some(marker) => writeln!(self.term, "{}", style.apply_to(format!(" {marker}")))?,
            None => writeln!(self.term)?,
        }
        Ok(())
    }
}

impl ReportSink for ConsoleReport {
    fn header(&mut self) -> Result<()> {
        writeln!(self.term, "{}", Style::new().yellow().apply_to(REPORT_HEADER))?;
        Ok(())
    }

    fn entry(&mut self, entry: &EntryDelta) -> Result<()> {
        self.difference(&entry.path, entry.delta, entry.marker())
    }

    fn summary(&mut self, first: &Snapshot, second: &Snapshot, package_delta: i64) -> Result<()> {
        writeln!(self.term, "{}", Style::new().green().apply_to("Summary:"))?;

        if self.verbose {
            let dim = Style::new().dim();
            for (label, snapshot) in [("apk1", first), ("apk2", second)] {
                let size = snapshot.package_size();
                writeln!(
                    self.term,
                    "{}",
                    dim.apply_to(format!(
                        "  {label}: {size:>12} ({})  {}",
                        humansize::format_size(size, humansize::BINARY),
                        snapshot.package_path().display()
                    ))
                )?;
            }
        }

        self.difference("Package size difference", package_delta, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_is_red_and_shrinkage_green() {
        console::set_colors_enabled(true);
        let grow = delta_style(1).apply_to("x").to_string();
        let shrink = delta_style(-1).apply_to("x").to_string();
        let zero = delta_style(0).apply_to("x").to_string();

        assert_eq!(grow, Style::new().red().apply_to("x").to_string());
        assert_eq!(shrink, Style::new().green().apply_to("x").to_string());
        assert_eq!(zero, shrink);
    }
}
