use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::error;

use mi_prep::{registry, run_dataset, DatasetSpec, PipelineConfig, SafetensorsCache};

#[derive(Parser)]
#[command(name = "mi-prep", about = "Motor-imagery EEG trial extraction to CSV")]
struct Args {
    /// Datasets to process, in order (default: all registered datasets)
    datasets: Vec<String>,

    /// Local recording cache ({cache_dir}/{dataset}/subject_{id}/…)
    #[arg(long, default_value = "./data")]
    cache_dir: PathBuf,

    /// Directory receiving one output directory per dataset
    #[arg(long, default_value = ".")]
    output_root: PathBuf,

    /// Attempts per subject before it is abandoned
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = 5.0)]
    backoff_secs: f64,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    // Resolve every name up front so a typo fails before any work starts.
    let specs: Vec<&DatasetSpec> = if args.datasets.is_empty() {
        registry::all().to_vec()
    } else {
        match args.datasets.iter().map(|n| registry::lookup(n)).collect::<Result<Vec<_>, _>>() {
            Ok(specs) => specs,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(2);
            }
        }
    };
    if !args.backoff_secs.is_finite() || args.backoff_secs < 0.0 {
        eprintln!("error: --backoff-secs must be a non-negative number");
        return ExitCode::from(2);
    }

    let cfg = PipelineConfig {
        cache_dir: args.cache_dir,
        output_root: args.output_root,
        max_retries: args.max_retries,
        retry_backoff: Duration::from_secs_f64(args.backoff_secs),
        ..PipelineConfig::default()
    };
    let source = SafetensorsCache::from_config(&cfg);

    for spec in specs {
        match run_dataset(spec, &cfg, &source) {
            Ok(report) => println!(
                "{:<18} subjects {} done / {} skipped / {} abandoned · runs {} written / {} empty / {} failed → {}",
                spec.name,
                report.subjects_done,
                report.subjects_skipped,
                report.subjects_abandoned,
                report.runs_written,
                report.runs_empty,
                report.runs_failed,
                cfg.dataset_dir(spec).display(),
            ),
            Err(e) => error!("{}: {e:#}", spec.name),
        }
    }

    ExitCode::SUCCESS
}
