// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Command-line drivers for the two regression workflows.
//!
//! `detect` validates a detector pipeline against stored baseline files;
//! `reduce` validates a temporal reduction the same way. Both regenerate
//! their baseline with `--baseline`, and baseline regeneration
//! deliberately exits nonzero so a CI job that regenerates instead of
//! comparing cannot pass by accident.

use std::env;
use std::process;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use gridflow::data::{Calendar, TimeUnits};
use gridflow::engine::{EngineSession, IndexExecutive, SessionOptions};
use gridflow::errors::FailureMode;
use gridflow::pipeline::Pipeline;
use gridflow::stages::{
    DetectorStage, DiffStage, Interval, JsonDirectorySource, JsonSink, ReductionOperator,
    ReductionStage, SourceStage, ThresholdModel, WriterStage,
};

/// Comparison tolerance used by both drivers.
const DRIVER_TOLERANCE: f64 = 1e-3;

const DEFAULT_UNITS: &str = "days since 2020-01-01";

fn usage(program: &str) {
    eprintln!("Usage: {program} detect [--baseline] <threshold> <data pattern> <baseline base> <variable> <n threads>");
    eprintln!("       {program} reduce [--baseline] <data pattern> <out base> <steps per file> <n threads> <interval> <operator> <array>...");
    eprintln!("Options (both subcommands):");
    eprintln!("       --calendar <gregorian|noleap|360_day>  calendar of the stored series");
    eprintln!("       --units <units string>                 e.g. \"{DEFAULT_UNITS}\"");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);
    if args.is_empty() {
        usage(&program);
        process::exit(1);
    }

    let subcommand = args.remove(0);
    let result = match subcommand.as_str() {
        "detect" => run_detect(args).await,
        "reduce" => run_reduce(args).await,
        _ => {
            usage(&program);
            process::exit(1);
        }
    };
    match result {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("{program}: {error:#}");
            process::exit(1);
        }
    }
}

/// Remove `--name <value>` from `args`, returning the value if present.
fn take_option(args: &mut Vec<String>, name: &str) -> Result<Option<String>, anyhow::Error> {
    match args.iter().position(|a| a == name) {
        Some(i) if i + 1 < args.len() => {
            args.remove(i);
            Ok(Some(args.remove(i)))
        }
        Some(_) => bail!("option {name} is missing its value"),
        None => Ok(None),
    }
}

/// Remove `--name` from `args`, returning whether it was present.
fn take_flag(args: &mut Vec<String>, name: &str) -> bool {
    match args.iter().position(|a| a == name) {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    }
}

fn parse_calendar(name: &str) -> Result<Calendar, anyhow::Error> {
    match name {
        "gregorian" | "standard" => Ok(Calendar::Gregorian),
        "noleap" | "365_day" => Ok(Calendar::Noleap),
        "360_day" => Ok(Calendar::Day360),
        other => bail!("unknown calendar '{other}'"),
    }
}

/// Shared time-axis options.
fn take_axis(args: &mut Vec<String>) -> Result<(Calendar, TimeUnits), anyhow::Error> {
    let calendar = match take_option(args, "--calendar")? {
        Some(name) => parse_calendar(&name)?,
        None => Calendar::Gregorian,
    };
    let units = match take_option(args, "--units")? {
        Some(text) => TimeUnits::parse(&text).context("bad --units")?,
        None => TimeUnits::parse(DEFAULT_UNITS).context("bad default units")?,
    };
    Ok((calendar, units))
}

fn session(n_threads: usize) -> EngineSession {
    EngineSession::new(SessionOptions {
        pool_size: n_threads.max(1),
        failure_mode: FailureMode::FailFast,
    })
}

async fn run_detect(mut args: Vec<String>) -> Result<i32, anyhow::Error> {
    let (calendar, units) = take_axis(&mut args)?;
    let generate_baseline = take_flag(&mut args, "--baseline");
    let [threshold, data_pattern, baseline_base, variable, n_threads] = args
        .try_into()
        .map_err(|_| anyhow::anyhow!("detect takes exactly five arguments"))?;
    let threshold: f64 = threshold.parse().context("bad detection threshold")?;
    let n_threads: usize = n_threads.parse().context("bad thread count")?;

    let data = JsonDirectorySource::open(&data_pattern, calendar, units.clone())
        .context("opening input series")?;

    let mut pipeline = Pipeline::new();
    let source = pipeline
        .add_stage(Arc::new(SourceStage::new(Arc::new(data))), &[])
        .context("assembling pipeline")?;
    let detect = pipeline
        .add_stage(
            Arc::new(DetectorStage::new(
                Arc::new(ThresholdModel { threshold }),
                variable,
            )),
            &[source],
        )
        .context("assembling pipeline")?;

    if generate_baseline {
        let write = pipeline
            .add_stage(
                Arc::new(WriterStage::new(
                    Arc::new(JsonSink),
                    format!("{baseline_base}_%t%.json"),
                )),
                &[detect],
            )
            .context("assembling pipeline")?;
        let results = session(n_threads)
            .run(Arc::new(pipeline), write, &IndexExecutive::new())
            .await
            .context("baseline generation failed")?;
        eprintln!(
            "detect: baseline regenerated ({} file(s)); rerun without --baseline to compare",
            results.len()
        );
        return Ok(1);
    }

    let baseline = JsonDirectorySource::open(&format!("{baseline_base}_*.json"), calendar, units)
        .context("opening baseline series")?;
    let reference = pipeline
        .add_stage(Arc::new(SourceStage::new(Arc::new(baseline))), &[])
        .context("assembling pipeline")?;
    let diff = pipeline
        .add_stage(
            Arc::new(DiffStage::new().with_tolerance(DRIVER_TOLERANCE)),
            &[reference, detect],
        )
        .context("assembling pipeline")?;

    let results = session(n_threads)
        .run(Arc::new(pipeline), diff, &IndexExecutive::new())
        .await
        .context("detection validation failed")?;
    println!("detect: {} step(s) validated", results.len());
    Ok(0)
}

async fn run_reduce(mut args: Vec<String>) -> Result<i32, anyhow::Error> {
    let (calendar, units) = take_axis(&mut args)?;
    let generate_baseline = take_flag(&mut args, "--baseline");
    if args.len() < 7 {
        bail!("reduce takes at least seven arguments");
    }
    let data_pattern = args.remove(0);
    let out_base = args.remove(0);
    let steps_per_file: u64 = args.remove(0).parse().context("bad steps per file")?;
    let n_threads: usize = args.remove(0).parse().context("bad thread count")?;
    let interval = Interval::from_str(&args.remove(0)).context("bad interval")?;
    let operator = ReductionOperator::from_str(&args.remove(0)).context("bad operator")?;
    let arrays = args;

    let data = JsonDirectorySource::open(&data_pattern, calendar, units.clone())
        .context("opening input series")?;

    let mut pipeline = Pipeline::new();
    let source = pipeline
        .add_stage(Arc::new(SourceStage::new(Arc::new(data))), &[])
        .context("assembling pipeline")?;
    let reduce = pipeline
        .add_stage(
            Arc::new(
                ReductionStage::new(operator, interval)
                    .with_arrays(arrays)
                    .with_stream_size(n_threads.max(1)),
            ),
            &[source],
        )
        .context("assembling pipeline")?;

    if generate_baseline {
        let write = pipeline
            .add_stage(
                Arc::new(
                    WriterStage::new(Arc::new(JsonSink), format!("{out_base}_%t%.json"))
                        .with_steps_per_file(steps_per_file),
                ),
                &[reduce],
            )
            .context("assembling pipeline")?;
        let results = session(n_threads)
            .run(Arc::new(pipeline), write, &IndexExecutive::new())
            .await
            .context("baseline generation failed")?;
        eprintln!(
            "reduce: baseline regenerated ({} file group(s)); rerun without --baseline to compare",
            results.len()
        );
        return Ok(1);
    }

    let baseline = JsonDirectorySource::open(&format!("{out_base}_*.json"), calendar, units)
        .context("opening baseline series")?;
    let reference = pipeline
        .add_stage(Arc::new(SourceStage::new(Arc::new(baseline))), &[])
        .context("assembling pipeline")?;
    let diff = pipeline
        .add_stage(
            Arc::new(DiffStage::new().with_tolerance(DRIVER_TOLERANCE)),
            &[reference, reduce],
        )
        .context("assembling pipeline")?;

    let results = session(n_threads)
        .run(Arc::new(pipeline), diff, &IndexExecutive::new())
        .await
        .context("reduction validation failed")?;
    println!("reduce: {} interval(s) validated", results.len());
    Ok(0)
}
