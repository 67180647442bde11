use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use colored::Colorize;
use pile_app::{AppConfig, AppContext};
use pile_collections::PileList;
use pile_store::{InMemoryPile, PileStats};
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };
    match cli.command {
        Command::Exercise(args) => cmd_exercise(&config, args, &cli.format),
        Command::Script(args) => cmd_script(&config, args, &cli.format),
        Command::Config => cmd_config(&config, &cli.format),
    }
}

/// Install the application and hand back its pile for statistics.
fn start_app(config: &AppConfig) -> anyhow::Result<Arc<InMemoryPile>> {
    pile_app::set_memory_model(config.memory_model)?;
    let pile = Arc::new(InMemoryPile::with_config(config.pile_config()));
    pile_app::install(AppContext::new(config.name.clone(), pile.clone())?)?;
    Ok(pile)
}

#[derive(Serialize)]
struct StatsReport {
    objects: usize,
    segments: usize,
    utilized_bytes: u64,
}

impl From<PileStats> for StatsReport {
    fn from(s: PileStats) -> Self {
        Self {
            objects: s.object_count,
            segments: s.segment_count,
            utilized_bytes: s.utilized_bytes,
        }
    }
}

#[derive(Serialize)]
struct ExerciseReport {
    appended: u64,
    removed: u64,
    remaining: usize,
    compacted_segments: usize,
    elapsed_ms: u128,
    integrity: bool,
    pile: StatsReport,
}

fn cmd_exercise(config: &AppConfig, args: ExerciseArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let pile = start_app(config)?;
    let started = Instant::now();

    let list = PileList::<u64>::new_default()?;
    for v in 0..args.count {
        list.add(&v)?;
    }
    let mut removed = 0;
    if args.remove_every > 0 {
        for v in (0..args.count).filter(|v| v % args.remove_every == 0) {
            if list.remove(&v)? {
                removed += 1;
            }
        }
    }
    let compacted_segments = if args.compact { pile.compact()? } else { 0 };
    let integrity = list.check_integrity().is_ok();

    let report = ExerciseReport {
        appended: args.count,
        removed,
        remaining: list.len()?,
        compacted_segments,
        elapsed_ms: started.elapsed().as_millis(),
        integrity,
        pile: pile.stats()?.into(),
    };
    pile_app::uninstall()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            let mark = if report.integrity { "✓".green().bold() } else { "✗".red().bold() };
            println!("{} Exercised list in {} ms", mark, report.elapsed_ms);
            println!("  Appended: {}", report.appended.to_string().bold());
            println!("  Removed: {}", report.removed.to_string().bold());
            println!("  Remaining: {}", report.remaining.to_string().bold());
            if args.compact {
                println!("  Compacted segments: {}", report.compacted_segments);
            }
            println!(
                "  Pile: {} objects in {} segments, {} bytes",
                report.pile.objects.to_string().cyan(),
                report.pile.segments.to_string().cyan(),
                report.pile.utilized_bytes.to_string().cyan()
            );
        }
    }
    if !report.integrity {
        bail!("list integrity check failed");
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ScriptOp {
    Add(String),
    PushFront(String),
    Remove(String),
    Contains(String),
    Clear,
    Len,
    Print,
    Check,
}

fn parse_op(text: &str) -> anyhow::Result<ScriptOp> {
    let (name, arg) = match text.split_once(':') {
        Some((name, arg)) => (name, Some(arg.to_string())),
        None => (text, None),
    };
    let op = match (name, arg) {
        ("add", Some(v)) => ScriptOp::Add(v),
        ("push-front", Some(v)) => ScriptOp::PushFront(v),
        ("remove", Some(v)) => ScriptOp::Remove(v),
        ("contains", Some(v)) => ScriptOp::Contains(v),
        ("clear", None) => ScriptOp::Clear,
        ("len", None) => ScriptOp::Len,
        ("print", None) => ScriptOp::Print,
        ("check", None) => ScriptOp::Check,
        _ => bail!("unrecognized operation `{text}`"),
    };
    Ok(op)
}

#[derive(Serialize)]
struct StepReport {
    op: String,
    result: serde_json::Value,
}

fn cmd_script(config: &AppConfig, args: ScriptArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let ops = args
        .ops
        .iter()
        .map(|text| parse_op(text))
        .collect::<anyhow::Result<Vec<_>>>()?;

    start_app(config)?;
    let list = PileList::<String>::new_default()?;
    let mut steps = Vec::with_capacity(ops.len());
    for (text, op) in args.ops.iter().zip(ops) {
        let result = match op {
            ScriptOp::Add(v) => {
                list.add(&v)?;
                serde_json::Value::from(list.len()?)
            }
            ScriptOp::PushFront(v) => {
                list.push_front(&v)?;
                serde_json::Value::from(list.len()?)
            }
            ScriptOp::Remove(v) => serde_json::Value::from(list.remove(&v)?),
            ScriptOp::Contains(v) => serde_json::Value::from(list.contains(&v)?),
            ScriptOp::Clear => {
                list.clear()?;
                serde_json::Value::from(0)
            }
            ScriptOp::Len => serde_json::Value::from(list.len()?),
            ScriptOp::Print => serde_json::Value::from(list.to_vec()?),
            ScriptOp::Check => serde_json::Value::from(list.check_integrity().is_ok()),
        };
        steps.push(StepReport {
            op: text.clone(),
            result,
        });
    }
    pile_app::uninstall()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&steps)?),
        OutputFormat::Text => {
            for step in &steps {
                println!("{} {}", step.op.yellow(), step.result);
            }
        }
    }
    Ok(())
}

fn cmd_config(config: &AppConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let effective = AppConfig {
        pile: Some(config.pile_config()),
        ..config.clone()
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&effective)?),
        OutputFormat::Text => print!("{}", effective.to_toml_string()?),
    }
    Ok(())
}
