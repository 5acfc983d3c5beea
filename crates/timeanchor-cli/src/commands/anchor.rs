use std::path::PathBuf;
use std::sync::Arc;

use chrono::FixedOffset;
use clap::Args;
use timeanchor_core::{
    AnchoringCoordinator, AnchoringReport, HttpOracle, ScoringMode, ScoringOracle,
    StaticTaskSource,
};
use tokio_util::sync::CancellationToken;

use super::{clock, read_file, CalendarArgs, CliResult};

#[derive(Args)]
pub struct AnchorArgs {
    /// JSON file with an array of tasks to anchor
    #[arg(long)]
    pub tasks: PathBuf,
    #[command(flatten)]
    pub calendar: CalendarArgs,
    /// Override the configured scoring mode (algorithmic, hybrid)
    #[arg(long)]
    pub mode: Option<ScoringMode>,
    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: AnchorArgs) -> CliResult {
    let mut config = args.calendar.load_config()?;
    if let Some(mode) = args.mode {
        config.scoring.mode = mode;
    }
    config.validate()?;

    let offset = config.utc_offset()?;
    let date = args.calendar.date_or_today(offset);
    let tasks = read_file(&args.tasks, StaticTaskSource::from_json_file)?;
    let calendar = args.calendar.source(offset)?;

    let oracle: Option<Arc<dyn ScoringOracle>> = match config.scoring.mode {
        ScoringMode::Hybrid => Some(Arc::new(HttpOracle::from_config(
            &config.oracle,
            config.oracle_timeout(),
        )?)),
        ScoringMode::Algorithmic => None,
    };
    let mut coordinator = AnchoringCoordinator::from_config(&config, oracle)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let cancel = CancellationToken::new();
    let report = runtime.block_on(async {
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        coordinator
            .run_for_user(
                calendar.as_ref(),
                &tasks,
                &args.calendar.user,
                date,
                &cancel,
            )
            .await
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, offset);
    }
    Ok(())
}

fn print_report(report: &AnchoringReport, offset: FixedOffset) {
    let result = &report.result;
    println!(
        "Anchoring {} ({} scoring, {} slots)",
        report.date,
        report.mode.as_str(),
        report.slots.len()
    );
    println!(
        "Anchored {}/{} tasks, average confidence {:.1}%",
        result.tasks_anchored, result.total_tasks, result.average_confidence
    );

    for a in &result.assignments {
        let moved = match a.original_start {
            Some(_) if a.adjustment_minutes != 0 => format!("  (moved {:+} min)", a.adjustment_minutes),
            Some(_) => "  (kept)".to_string(),
            None => String::new(),
        };
        println!(
            "  {}-{}  {:<32} {}  {:>5.1}%{}",
            clock(a.anchored_start, offset),
            clock(a.anchored_end, offset),
            a.task_title,
            a.slot_id,
            a.confidence,
            moved
        );
    }

    if !result.unassigned.is_empty() {
        println!("Unassigned:");
        for u in &result.unassigned {
            println!("  {:<10} {:<32} {}", u.task_id, u.title, u.reason.as_str());
        }
    }

    if let Some(stats) = &report.semantic {
        println!(
            "Oracle: {} calls, {} fallbacks, {} pairs scored",
            stats.oracle_calls, stats.fallbacks, stats.pairs_scored
        );
    }
}
