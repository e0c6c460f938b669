//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use bibharvest_core::SiteVariant;
use clap::{Parser, Subcommand};

/// Harvest PDFs, reference lists and citation records for a literature review.
///
/// Every command walks its input one item at a time, skips items whose output
/// already exists, and stops after too many consecutive failures. Rerun the
/// same command to resume.
#[derive(Parser, Debug)]
#[command(name = "bibharvest")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download the PDF behind each entry's `url` field
    Download {
        /// BibTeX bibliography
        bibliography: PathBuf,
        /// Directory receiving `<key>.pdf` files
        output_dir: PathBuf,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Extract the reference list of each entry's article page
    References {
        /// Publisher site layout
        #[arg(value_enum)]
        site: SiteVariant,
        /// BibTeX bibliography
        bibliography: PathBuf,
        /// Directory receiving `<site>.txt` and `<site>/<key>.txt`
        output_dir: PathBuf,
        /// Also collect the "cited by" list (ACM only)
        #[arg(long)]
        cited_by: bool,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Search each classified title and export its citation record
    Cite {
        /// Classified articles, one JSON object per line
        input: PathBuf,
        /// Directory receiving `<category>.bib` and `citations/`
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Also look up articles classified as irrelevant
        #[arg(long)]
        include_irrelevant: bool,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Classify each line of a reference list with the configured oracle
    ///
    /// Reads API_KEY, MODEL, BASE_URL and optionally TEMPERATURE from the
    /// environment.
    Classify {
        /// Reference list, one reference per line
        references: PathBuf,
        /// Directory receiving `result.jsonl` and `failed.log`
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
}

/// Politeness and failure policy overrides.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Pause between attempted items in milliseconds (default depends on command)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=600_000))]
    pub delay_ms: Option<u64>,

    /// Consecutive failures that stop the run (default 6)
    #[arg(long)]
    pub failure_tolerance: Option<u32>,
}

/// Browser launch options.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BrowserArgs {
    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Browser executable (falls back to BIBHARVEST_CHROME, then auto-detection)
    #[arg(long, value_name = "PATH")]
    pub chrome: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_download_parses_positionals() {
        let args = Args::try_parse_from(["bibharvest", "download", "refs.bib", "out"]).unwrap();
        let Command::Download {
            bibliography,
            output_dir,
            run,
            browser,
        } = args.command
        else {
            panic!("expected download");
        };
        assert_eq!(bibliography, PathBuf::from("refs.bib"));
        assert_eq!(output_dir, PathBuf::from("out"));
        assert_eq!(run.delay_ms, None);
        assert!(!browser.headful);
    }

    #[test]
    fn test_cli_verbose_flag_is_global() {
        let args = Args::try_parse_from(["bibharvest", "classify", "acm.txt", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["bibharvest", "-q", "classify", "acm.txt"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_references_site_and_flags() {
        let args = Args::try_parse_from([
            "bibharvest",
            "references",
            "arxiv",
            "refs.bib",
            "out",
            "--cited-by",
            "--delay-ms",
            "0",
            "--failure-tolerance",
            "3",
            "--headful",
            "--chrome",
            "/usr/bin/chromium",
        ])
        .unwrap();
        let Command::References {
            site,
            cited_by,
            run,
            browser,
            ..
        } = args.command
        else {
            panic!("expected references");
        };
        assert_eq!(site, SiteVariant::Arxiv);
        assert!(cited_by);
        assert_eq!(run.delay_ms, Some(0));
        assert_eq!(run.failure_tolerance, Some(3));
        assert!(browser.headful);
        assert_eq!(browser.chrome, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn test_cli_unknown_site_rejected() {
        let err = Args::try_parse_from(["bibharvest", "references", "ieee", "refs.bib", "out"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn test_cli_cite_default_output_dir() {
        let args = Args::try_parse_from(["bibharvest", "cite", "result.jsonl"]).unwrap();
        let Command::Cite {
            output_dir,
            include_irrelevant,
            ..
        } = args.command
        else {
            panic!("expected cite");
        };
        assert_eq!(output_dir, PathBuf::from("."));
        assert!(!include_irrelevant);
    }

    #[test]
    fn test_cli_missing_subcommand_is_error() {
        assert!(Args::try_parse_from(["bibharvest"]).is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["bibharvest", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
