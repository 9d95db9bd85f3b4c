//! apkdiff: APK size regression checker
//!
//! Compares the entries of two APK packages, or of a package against a
//! saved `.apkdesc` description, and reports which entries grew or shrank.

mod logging;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::builder::styling::{AnsiColor, Effects};
use clap::{CommandFactory as _, Parser, builder::Styles};
use color_eyre::Result;
use tracing::debug;

use apkdiff_core::{
    ApkdiffConfig, ComparatorRegistry, DiffEngine, LoadError, LoadOptions, RegressionPolicy,
    Snapshot, SnapshotLoader, Thresholds,
};

use crate::report::ConsoleReport;

/// Exit code when a size regression is detected
const REGRESSION_EXIT: u8 = 3;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::Red.on_default());

#[derive(Parser, Debug)]
#[command(name = "apkdiff")]
#[command(version)]
#[command(styles = STYLES)]
#[command(override_usage = "apkdiff [OPTIONS] <package1.apk[desc]> [<package2.apk[desc]>]")]
#[command(about = "Compares APK packages content or APK package with content description")]
#[command(long_about = r#"
Compares APK packages content or APK package with content description.

Examples:
  apkdiff old.apk new.apk                  Compare two packages
  apkdiff -s app.apk                       Save app.apkdesc next to app.apk
  apkdiff baseline.apkdesc app.apk         Compare against a saved description
  apkdiff --test-apk-size-regression 51200 baseline.apkdesc app.apk
"#)]
struct Cli {
    /// Comment to be saved inside .apkdesc file
    #[arg(short, long)]
    comment: Option<String>,

    /// Save .apkdesc files next to the apk package(s)
    #[arg(short, long)]
    save_descriptions: bool,

    /// Output information about progress during the run of the tool
    #[arg(short, long)]
    verbose: bool,

    /// Check whether apk size increased more than BYTES
    #[arg(long = "test-apk-size-regression", value_name = "BYTES")]
    apk_regression: Option<u64>,

    /// Check whether any assembly size increased more than BYTES (not enforced yet)
    #[arg(long = "test-assembly-size-regression", value_name = "BYTES")]
    assembly_regression: Option<u64>,

    /// Packages (.apk) or descriptions (.apkdesc)
    #[arg(value_name = "PACKAGE")]
    packages: Vec<PathBuf>,
}

/// Wrong combination of arguments
#[derive(Debug, PartialEq, Eq)]
struct UsageError {
    message: &'static str,
    code: u8,
}

impl Cli {
    /// Thresholds given on the command line only
    fn requested_thresholds(&self) -> Thresholds {
        ApkdiffConfig::default().thresholds(self.apk_regression, self.assembly_regression)
    }

    /// The one or two paths to work on
    fn paths(&self) -> Result<(&Path, Option<&Path>), UsageError> {
        let count = self.packages.len();

        if count != 2 && self.requested_thresholds().is_set() {
            return Err(UsageError {
                message: "Please specify 2 APK packages for regression testing.",
                code: 2,
            });
        }

        match self.packages.as_slice() {
            [first, second] => Ok((first.as_path(), Some(second.as_path()))),
            [single] if self.save_descriptions => Ok((single.as_path(), None)),
            _ => Err(UsageError {
                message: "Please specify 2 APK packages to compare or 1 and use -s option.",
                code: 1,
            }),
        }
    }
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(cli.verbose);

    if cli.packages.is_empty() {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    }

    let (first_path, second_path) = match cli.paths() {
        Ok(paths) => paths,
        Err(usage) => {
            report::error(usage.message);
            return Ok(ExitCode::from(usage.code));
        }
    };

    let config = ApkdiffConfig::load(Path::new("."))?;
    let loader = SnapshotLoader::new(LoadOptions {
        save_description: cli.save_descriptions,
        comment: cli.comment.clone().or_else(|| config.comment.clone()),
    });

    let first = match load(&loader, first_path) {
        Ok(snapshot) => snapshot,
        Err(code) => return Ok(code),
    };

    let Some(second_path) = second_path else {
        return Ok(ExitCode::SUCCESS);
    };

    let second = match load(&loader, second_path) {
        Ok(snapshot) => snapshot,
        Err(code) => return Ok(code),
    };

    let registry = ComparatorRegistry::new();
    let mut console = ConsoleReport::new(cli.verbose);
    let diff = DiffEngine::new(&registry).run(&first, &second, &mut console)?;

    // Closes both archives
    drop(first);
    drop(second);

    let thresholds = config.thresholds(cli.apk_regression, cli.assembly_regression);
    if thresholds.assembly != 0 {
        report::warning("Assembly size regression threshold is accepted but not enforced.");
    }

    let verdict = RegressionPolicy::new(thresholds).check(&diff);
    for regression in &verdict.regressions {
        report::error(&regression.to_string());
    }

    if !verdict.passed() {
        report::error("Size regression occured, test failed.");
        return Ok(ExitCode::from(REGRESSION_EXIT));
    }

    Ok(ExitCode::SUCCESS)
}

/// Load `path`, turning loader failures into their exit code
fn load(loader: &SnapshotLoader, path: &Path) -> std::result::Result<Snapshot, ExitCode> {
    debug!("Loading '{}'", path.display());

    loader.load(path).map_err(|err: LoadError| {
        report::error(&err.to_string());
        ExitCode::from(err.exit_code())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("apkdiff").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_two_packages() {
        let cli = parse(&["a.apk", "b.apkdesc"]);
        let (first, second) = cli.paths().unwrap();
        assert_eq!(first, Path::new("a.apk"));
        assert_eq!(second, Some(Path::new("b.apkdesc")));
    }

    #[test]
    fn test_single_package_requires_save() {
        let cli = parse(&["a.apk"]);
        assert_eq!(cli.paths().unwrap_err().code, 1);

        let cli = parse(&["-s", "-c", "nightly", "a.apk"]);
        assert_eq!(cli.paths().unwrap(), (Path::new("a.apk"), None));
        assert_eq!(cli.comment.as_deref(), Some("nightly"));
    }

    #[test]
    fn test_too_many_packages() {
        let cli = parse(&["-s", "a.apk", "b.apk", "c.apk"]);
        assert_eq!(cli.paths().unwrap_err().code, 1);
    }

    #[test]
    fn test_regression_requires_two_packages() {
        let cli = parse(&["-s", "--test-apk-size-regression", "100", "a.apk"]);
        assert_eq!(cli.paths().unwrap_err().code, 2);

        let cli = parse(&["--test-assembly-size-regression", "10", "a.apk"]);
        assert_eq!(cli.paths().unwrap_err().code, 2);
    }

    #[test]
    fn test_zero_threshold_is_unset() {
        let cli = parse(&["-s", "--test-apk-size-regression", "0", "a.apk"]);
        assert!(cli.paths().is_ok());
    }

    #[test]
    fn test_regression_thresholds_parsed() {
        let cli = parse(&[
            "--test-apk-size-regression",
            "51200",
            "--test-assembly-size-regression",
            "4096",
            "a.apkdesc",
            "b.apk",
        ]);
        assert_eq!(
            cli.requested_thresholds(),
            Thresholds {
                package: 51200,
                assembly: 4096
            }
        );
        assert!(cli.paths().is_ok());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let result = Cli::try_parse_from(["apkdiff", "--test-apk-size-regression", "-5", "a", "b"]);
        assert!(result.is_err());
    }
}
