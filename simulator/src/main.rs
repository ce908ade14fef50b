use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use trackcore::estimation::CancellationFlag;
use trackcore::prelude::EstimatorKind;
use trackcore::InMemoryRecordSet;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Clone, Copy, ValueEnum)]
enum EstimatorArg {
    Bartlett,
    Ml,
}

impl From<EstimatorArg> for EstimatorKind {
    fn from(arg: EstimatorArg) -> Self {
        match arg {
            EstimatorArg::Bartlett => EstimatorKind::Bartlett,
            EstimatorArg::Ml => EstimatorKind::MaximumLikelihood,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "Offline bearing and position tracking driver")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = EstimatorArg::Bartlett)]
    estimator: EstimatorArg,
    /// Tracking window width in seconds
    #[arg(long, default_value_t = 1.0)]
    window: f64,
    #[arg(long, default_value_t = 1.0)]
    step: f64,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Read signal records from a JSON array instead of synthesizing them
    #[arg(long)]
    records: Option<PathBuf>,
    /// Write the records used for this run as JSON
    #[arg(long)]
    dump_records: Option<PathBuf>,
    /// Append a JSON summary of the run
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.estimator.into(), args.window, args.step, args.seed)
    };
    let runner = Runner::new(workflow_config);

    let records = match &args.records {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening record set {}", path.display()))?;
            InMemoryRecordSet::from_json_reader(BufReader::new(file))
                .with_context(|| format!("parsing record set {}", path.display()))?
        }
        None => runner.synthesize_records(),
    };
    if let Some(path) = &args.dump_records {
        let json = records.to_json_string().context("serializing records")?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    let cancel = CancellationFlag::new();
    let runtime = TokioBuilder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;
    let on_signal = cancel.clone();
    runtime.spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, finishing completed windows");
            on_signal.cancel();
        }
    });

    let result = runner.execute(&records, cancel)?;
    runtime.shutdown_background();

    println!(
        "Tracked {} windows -> fixes {}, failures {}, unscored records {}, mean error {}{}",
        result.windows,
        result.fixes.len(),
        result.failures.len(),
        result.record_failures,
        result
            .mean_error_m
            .map(|e| format!("{:.1} m", e))
            .unwrap_or_else(|| "n/a".into()),
        if result.cancelled { " (cancelled)" } else { "" }
    );
    for fix in &result.fixes {
        println!(
            "  [{:>7.2}, {:>7.2}] ({:>9.1}, {:>9.1}) sites={} residual={:.4} error={:.1} m{}",
            fix.start,
            fix.end,
            fix.x,
            fix.y,
            fix.sites,
            fix.residual,
            fix.error_m,
            if fix.refined { "" } else { " grid" }
        );
    }
    for failure in &result.failures {
        println!("  failed {}", failure);
    }
    for skip in &result.skipped {
        println!("  skipped {}", skip);
    }

    if let Some(report_path) = &args.report {
        if let Some(parent) = report_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(report_path)
            .with_context(|| format!("opening report {}", report_path.display()))?;
        let line = serde_json::to_string(&result).context("serializing report")?;
        writeln!(file, "{}", line)?;
    }

    Ok(())
}
