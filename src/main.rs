//! CLI entry point for the bibharvest tool.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bibharvest_core::browser::LaunchOptions;
use bibharvest_core::classify::OracleClient;
use bibharvest_core::config::Target;
use bibharvest_core::download::HttpClient;
use bibharvest_core::pipeline::HarvestJob;
use bibharvest_core::pipeline::jobs::{
    CLASSIFIED_LEDGER, CiteJob, ClassifyJob, DEFAULT_CITED_BY_SETTLE, DownloadJob, ReferencesJob,
    load_citation_queries, load_reference_lines,
};
use bibharvest_core::{
    ChromiumLauncher, CitationSearchAutomaton, DomainDispatcher, EntrySource, OracleConfig,
    OutputSink, PipelineRunner, RunConfig, RunState, SearchSettings, SessionLauncher,
    SiteVariant,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, BrowserArgs, Command, RunArgs};

/// Page settle time for sites that put a bot challenge in front of content.
const CHALLENGE_SETTLE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    init_tracing(default_log_level(&args));
    debug!(?args, "CLI arguments parsed");

    let show_progress =
        should_show_progress(io::stderr().is_terminal(), args.quiet, is_dumb_terminal());

    match args.command {
        Command::Download {
            bibliography,
            output_dir,
            run,
            browser,
        } => {
            let config = run_config(Target::Download, &run)?;
            let source = load_bibliography(&bibliography)?;
            let session_launcher = launcher(&browser, CHALLENGE_SETTLE);
            let dispatcher = DomainDispatcher::new(HttpClient::new()?, session_launcher);
            let sink = OutputSink::open(&output_dir).await?;
            execute(
                DownloadJob::new(dispatcher),
                source.entries(),
                sink,
                config,
                show_progress,
            )
            .await
        }

        Command::References {
            site,
            bibliography,
            output_dir,
            cited_by,
            run,
            browser,
        } => {
            let config = run_config(Target::References, &run)?;
            let source = load_bibliography(&bibliography)?;
            if cited_by && !site.has_cited_by() {
                warn!(site = %site, "site has no cited-by list; ignoring --cited-by");
            }
            let settle = match site {
                SiteVariant::Acm => CHALLENGE_SETTLE,
                SiteVariant::Arxiv | SiteVariant::Springer => Duration::ZERO,
            };
            let job = ReferencesJob::new(launcher(&browser, settle), site)
                .with_cited_by(cited_by, DEFAULT_CITED_BY_SETTLE);
            let sink = OutputSink::open(&output_dir).await?;
            execute(job, source.entries(), sink, config, show_progress).await
        }

        Command::Cite {
            input,
            output_dir,
            include_irrelevant,
            run,
            browser,
        } => {
            let config = run_config(Target::Cite, &run)?;
            let queries = load_citation_queries(&input, include_irrelevant)?;
            info!(queries = queries.len(), "citation queries loaded");
            let automaton = CitationSearchAutomaton::new(
                launcher(&browser, CHALLENGE_SETTLE),
                SearchSettings::default(),
            );
            let sink = OutputSink::open(&output_dir).await?;
            execute(CiteJob::new(automaton), &queries, sink, config, show_progress).await
        }

        Command::Classify {
            references,
            output_dir,
            run,
        } => {
            // Credentials are checked before any input is read.
            let oracle_config =
                OracleConfig::from_env().context("classification oracle is not configured")?;
            let config = run_config(Target::Classify, &run)?;
            let lines = load_reference_lines(&references)?;
            let sink = OutputSink::open(&output_dir).await?;
            let done = sink.read_lines(CLASSIFIED_LEDGER).await?;
            info!(
                lines = lines.len(),
                already_classified = done.len(),
                "reference list loaded"
            );
            let job = ClassifyJob::new(OracleClient::new(oracle_config)?, done);
            execute(job, &lines, sink, config, show_progress).await
        }
    }
}

async fn execute<J: HarvestJob>(
    job: J,
    items: &[J::Item],
    sink: OutputSink,
    config: RunConfig,
    show_progress: bool,
) -> Result<()> {
    let mut state = RunState::new(sink, &config);
    let mut runner = PipelineRunner::new(job, config);
    if show_progress {
        runner = runner.with_progress(progress_bar());
    }

    let stats = runner.run(items, &mut state).await?;
    if stats.failed + stats.not_found > 0 {
        info!(
            failures = stats.failed + stats.not_found,
            log = %state.sink().failure_log_path().display(),
            "some items were not harvested"
        );
    }
    Ok(())
}

fn run_config(target: Target, run: &RunArgs) -> Result<RunConfig> {
    Ok(RunConfig::for_target(target).with_overrides(run.delay_ms, run.failure_tolerance)?)
}

fn load_bibliography(path: &Path) -> Result<EntrySource> {
    let source = EntrySource::from_path(path)?;
    info!(
        entries = source.len(),
        skipped = source.warnings().len(),
        "bibliography loaded"
    );
    Ok(source)
}

fn launcher(args: &BrowserArgs, settle: Duration) -> Arc<dyn SessionLauncher> {
    let mut options = LaunchOptions {
        headful: args.headful,
        settle,
        ..LaunchOptions::default()
    };
    if args.chrome.is_some() {
        options.executable.clone_from(&args.chrome);
    }
    Arc::new(ChromiumLauncher::new(options))
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

// Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
fn default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(!is_dumb_terminal())
        .with_env_filter(filter)
        .try_init();
}

fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

fn should_show_progress(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}
