//! Command line interface of `arcstream`.
//!
//! Parses the arguments, sets up colors, logging and progress bars, and runs
//! one worker per source. The process fails if any source failed.
use std::{env, io::IsTerminal, path::PathBuf, sync::Arc, time::Duration};

use arcstream_core::{Orchestrator, WorkerError, WorkerOptions, WorkerReport};
use arcstream_extract::SinkOptions;
use arcstream_progress::{ProgressHandler, global_multi_progress};
use arcstream_transfer::{DEFAULT_POLL_INTERVAL, HttpEngine, SourceLocator, TransferConfig};
use clap::Parser;
use indicatif::ProgressDrawTarget;
use miette::{Diagnostic, IntoDiagnostic};
use reporter::ConsoleReporter;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{level_filters::LevelFilter, warn};

mod reporter;

/// Download archives and extract them while they stream in.
#[derive(Debug, Parser)]
#[clap(name = "arcstream", version)]
pub struct Args {
    /// URLs or local paths of the archives to extract.
    #[clap(required = true, value_name = "SOURCE")]
    sources: Vec<SourceLocator>,

    /// Directory to extract the archives into.
    #[clap(
        short = 'C',
        long,
        default_value = ".",
        env = "ARCSTREAM_DIRECTORY"
    )]
    directory: PathBuf,

    #[clap(flatten)]
    transfer: TransferOptions,

    #[clap(flatten)]
    extract: ExtractOptions,

    #[clap(flatten)]
    global_options: GlobalOptions,
}

#[derive(Debug, Parser)]
pub struct TransferOptions {
    /// Longest time in milliseconds a transfer waits for data before checking
    /// for cancellation.
    #[clap(
        long,
        value_name = "MS",
        default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64,
        env = "ARCSTREAM_POLL_INTERVAL"
    )]
    poll_interval: u64,

    /// Timeout in seconds for establishing a connection.
    #[clap(
        long,
        value_name = "SECS",
        default_value_t = 30,
        env = "ARCSTREAM_CONNECT_TIMEOUT"
    )]
    connect_timeout: u64,

    /// Timeout in seconds between two reads of an open connection.
    #[clap(
        long,
        value_name = "SECS",
        default_value_t = 300,
        env = "ARCSTREAM_READ_TIMEOUT"
    )]
    read_timeout: u64,

    /// The User-Agent header sent with every request.
    #[clap(long, env = "ARCSTREAM_USER_AGENT")]
    user_agent: Option<String>,
}

impl TransferOptions {
    fn to_config(&self) -> TransferConfig {
        let defaults = TransferConfig::default();
        TransferConfig {
            poll_interval: Duration::from_millis(self.poll_interval.max(1)),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            read_timeout: Duration::from_secs(self.read_timeout),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            ..defaults
        }
    }
}

#[derive(Debug, Parser)]
pub struct ExtractOptions {
    /// Do not restore the permission bits stored in the archives.
    #[clap(long, env = "ARCSTREAM_NO_PRESERVE_PERMISSIONS")]
    no_preserve_permissions: bool,

    /// Do not restore the modification times stored in the archives.
    #[clap(long, env = "ARCSTREAM_NO_PRESERVE_MTIME")]
    no_preserve_mtime: bool,
}

impl ExtractOptions {
    fn to_sink_options(&self) -> SinkOptions {
        SinkOptions {
            preserve_permissions: !self.no_preserve_permissions,
            preserve_mtime: !self.no_preserve_mtime,
        }
    }
}

#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Increase logging verbosity (-v for warnings, -vv for info, -vvv for debug, -vvvv for trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (quiet mode)
    #[clap(short, long, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Whether the log needs to be colored.
    #[clap(long, default_value = "auto", env = "ARCSTREAM_COLOR")]
    color: ColorOutput,

    /// Hide all progress bars, always turned on if stderr is not a terminal.
    #[clap(long, default_value = "false", env = "ARCSTREAM_NO_PROGRESS")]
    no_progress: bool,
}

impl Args {
    /// Whether to show progress bars or not, based on the terminal and the user's preference.
    fn no_progress(&self) -> bool {
        !std::io::stderr().is_terminal() || self.global_options.no_progress
    }

    /// Determine the log level filter based on verbose and quiet counts.
    fn log_level_filter(&self) -> LevelFilter {
        match (self.global_options.quiet, self.global_options.verbose) {
            // Quiet mode overrides verbose
            (q, _) if q > 0 => LevelFilter::OFF,
            (_, 0) => LevelFilter::ERROR,
            (_, 1) => LevelFilter::WARN,
            (_, 2) => LevelFilter::INFO,
            (_, 3) => LevelFilter::DEBUG,
            (_, _) => LevelFilter::TRACE,
        }
    }

    fn worker_options(&self, config: &TransferConfig) -> WorkerOptions {
        WorkerOptions {
            destination: self.directory.clone(),
            sink: self.extract.to_sink_options(),
            poll_interval: config.poll_interval,
        }
    }
}

/// A source that could not be extracted.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("{locator}")]
struct SourceFailure {
    locator: SourceLocator,
    #[source]
    source: WorkerError,
}

/// The error the process exits with when any source failed.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("failed to extract {} of {total} sources", .failures.len())]
struct ExtractionFailed {
    total: usize,
    #[related]
    failures: Vec<SourceFailure>,
}

impl ExtractionFailed {
    /// Collects the failed reports, `None` if every source succeeded.
    fn from_reports(reports: Vec<WorkerReport>) -> Option<Self> {
        let total = reports.len();
        let failures: Vec<_> = reports
            .into_iter()
            .filter_map(|report| match report.outcome {
                Ok(_) => None,
                Err(source) => Some(SourceFailure {
                    locator: report.locator,
                    source,
                }),
            })
            .collect();
        (!failures.is_empty()).then_some(Self { total, failures })
    }
}

pub async fn execute() -> miette::Result<()> {
    let args = Args::parse();

    set_console_colors(&args);
    let use_colors = console::colors_enabled_stderr();
    let in_ci = matches!(env::var("CI").as_deref(), Ok("1" | "true"));
    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::default()
                .color(use_colors)
                .wrap_lines(!in_ci)
                .build(),
        )
    }))?;

    // Hide all progress bars if the user requested it.
    if args.no_progress() {
        global_multi_progress().set_draw_target(ProgressDrawTarget::hidden());
    }

    setup_logging(&args, use_colors)?;

    let reports = run(args, cancel_on_ctrl_c()).await?;
    match ExtractionFailed::from_reports(reports) {
        Some(failed) => Err(failed.into()),
        None => Ok(()),
    }
}

/// Extracts every source of `args` and returns the reports in argument order.
async fn run(args: Args, cancellation: CancellationToken) -> miette::Result<Vec<WorkerReport>> {
    let config = args.transfer.to_config();
    let options = args.worker_options(&config);
    let engine = HttpEngine::new(config, Handle::current()).into_diagnostic()?;

    let progress: Arc<dyn ProgressHandler> = Arc::new(ConsoleReporter::default());
    let orchestrator = Orchestrator::new(Arc::new(engine), options)
        .with_progress(progress)
        .with_cancellation(cancellation);
    orchestrator.run(args.sources).await.into_diagnostic()
}

/// Returns a token that is cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling all transfers");
            cancel.cancel();
        }
    });
    token
}

fn setup_logging(args: &Args, use_colors: bool) -> miette::Result<()> {
    use arcstream_progress::IndicatifWriter;
    use tracing_subscriber::{
        EnvFilter, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
    };

    let (low_level_filter, level_filter, arcstream_level) = match args.log_level_filter() {
        LevelFilter::OFF => (LevelFilter::OFF, LevelFilter::OFF, LevelFilter::OFF),
        LevelFilter::ERROR => (LevelFilter::ERROR, LevelFilter::ERROR, LevelFilter::WARN),
        LevelFilter::WARN => (LevelFilter::WARN, LevelFilter::WARN, LevelFilter::INFO),
        LevelFilter::INFO => (LevelFilter::WARN, LevelFilter::INFO, LevelFilter::DEBUG),
        LevelFilter::DEBUG => (LevelFilter::INFO, LevelFilter::DEBUG, LevelFilter::TRACE),
        LevelFilter::TRACE => (LevelFilter::TRACE, LevelFilter::TRACE, LevelFilter::TRACE),
    };
    let directives = log_directives(arcstream_level, low_level_filter);

    // Verbosity flags take precedence over RUST_LOG.
    let cli_verbosity_set = args.global_options.verbose > 0 || args.global_options.quiet > 0;
    let directives = match env::var("RUST_LOG") {
        Ok(env_directives) if !cli_verbosity_set && !env_directives.is_empty() => {
            format!("{directives},{env_directives}")
        }
        _ => directives,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .parse(&directives)
        .into_diagnostic()?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(use_colors)
        .with_target(arcstream_level >= LevelFilter::DEBUG)
        .with_writer(IndicatifWriter::default())
        .without_time();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
    Ok(())
}

fn log_directives(arcstream_level: LevelFilter, low_level: LevelFilter) -> String {
    ["arcstream_cli", "arcstream_core", "arcstream_extract", "arcstream_transfer"]
        .iter()
        .map(|target| format!("{target}={arcstream_level}"))
        .chain(["hyper", "reqwest"].iter().map(|target| format!("{target}={low_level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Whether to use colored log format.
/// Option `Auto` enables color output only if the logging is done to a terminal
/// and  `NO_COLOR` environment variable is not set.
#[derive(clap::ValueEnum, Debug, Clone, Default)]
pub enum ColorOutput {
    Always,
    Never,

    #[default]
    Auto,
}

fn set_console_colors(args: &Args) {
    // FORCE_COLOR and NO_COLOR take precedence over the flag.
    let color = match env::var("FORCE_COLOR") {
        Ok(_) => &ColorOutput::Always,
        Err(_) => match env::var("NO_COLOR") {
            Ok(_) => &ColorOutput::Never,
            Err(_) => &args.global_options.color,
        },
    };

    match color {
        ColorOutput::Always => {
            console::set_colors_enabled(true);
            console::set_colors_enabled_stderr(true);
        }
        ColorOutput::Never => {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
        ColorOutput::Auto => {}
    };
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use arcstream_core::{WorkerError, WorkerReport, WorkerSummary};
    use arcstream_extract::OpenError;
    use arcstream_transfer::SourceLocator;
    use clap::Parser;
    use rstest::rstest;
    use tracing::level_filters::LevelFilter;

    use super::{Args, ExtractionFailed, log_directives};

    #[rstest]
    #[case::default(&[], LevelFilter::ERROR)]
    #[case::verbose(&["-v"], LevelFilter::WARN)]
    #[case::very_verbose(&["-vvv"], LevelFilter::DEBUG)]
    #[case::trace(&["-vvvvv"], LevelFilter::TRACE)]
    #[case::quiet_wins(&["-q", "-vv"], LevelFilter::OFF)]
    fn maps_verbosity_flags(#[case] flags: &[&str], #[case] expected: LevelFilter) {
        let args = Args::try_parse_from(
            ["arcstream", "https://example.com/a.tar.gz"]
                .iter()
                .chain(flags),
        )
        .unwrap();
        assert_eq!(args.log_level_filter(), expected);
    }

    #[test]
    fn at_least_one_source_is_required() {
        let err = Args::try_parse_from(["arcstream", "-C", "out"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn flags_map_onto_transfer_and_sink_settings() {
        let args = Args::try_parse_from([
            "arcstream",
            "--poll-interval",
            "250",
            "--read-timeout",
            "7",
            "--user-agent",
            "tests/1.0",
            "--no-preserve-mtime",
            "-C",
            "out",
            "https://example.com/a.tar.gz",
            "./local.tar",
        ])
        .unwrap();

        let config = args.transfer.to_config();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.read_timeout, Duration::from_secs(7));
        assert_eq!(config.user_agent, "tests/1.0");

        let options = args.worker_options(&config);
        assert_eq!(options.destination.to_str(), Some("out"));
        assert_eq!(options.poll_interval, Duration::from_millis(250));
        assert!(options.sink.preserve_permissions);
        assert!(!options.sink.preserve_mtime);

        assert_eq!(args.sources.len(), 2);
        assert_eq!(args.sources[1].url().scheme(), "file");
    }

    #[test]
    fn failures_are_collected_from_reports() {
        let ok = WorkerReport {
            locator: SourceLocator::parse("https://example.com/ok.tar").unwrap(),
            outcome: Ok(WorkerSummary::default()),
        };
        let failed = WorkerReport {
            locator: SourceLocator::parse("https://example.com/bad.tar").unwrap(),
            outcome: Err(WorkerError::Open(OpenError::NotAnArchive)),
        };

        assert!(ExtractionFailed::from_reports(vec![ok.clone()]).is_none());
        let error = ExtractionFailed::from_reports(vec![ok, failed]).unwrap();
        assert_eq!(error.total, 2);
        assert_eq!(error.failures.len(), 1);
        assert_eq!(error.to_string(), "failed to extract 1 of 2 sources");
    }

    #[test]
    fn log_directives_cover_every_crate() {
        let directives = log_directives(LevelFilter::DEBUG, LevelFilter::WARN);
        assert!(directives.contains("arcstream_core=debug"));
        assert!(directives.contains("reqwest=warn"));
    }
}
