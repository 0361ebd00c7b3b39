//! pdhmond - Windows performance counter collector daemon.
//!
//! Collects configured performance objects at a fixed interval and writes one
//! JSON line per object and cycle to stdout. Logs go to stderr.

mod config;

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use pdhmon_core::collector::{Collector, PdhApi};
#[cfg(not(windows))]
use pdhmon_core::collector::MockPdh;
#[cfg(windows)]
use pdhmon_core::collector::RealPdh;
use pdhmon_core::config::CounterGroup;
use pdhmon_core::model::{ComputedValue, Snapshot};

use crate::config::{DEFAULT_INTERVAL_SECS, DaemonConfig};

/// Windows performance counter collector daemon.
#[derive(Parser)]
#[command(name = "pdhmond", about = "Windows performance counter collector daemon", version)]
struct Args {
    /// JSON config file with counter groups.
    #[arg(short, long, value_name = "FILE", conflicts_with = "object")]
    config: Option<PathBuf>,

    /// Performance object to collect, e.g. "LogicalDisk".
    #[arg(long)]
    object: Option<String>,

    /// Instance of --object (repeatable). Omit for objects without instances.
    #[arg(long = "instance", value_name = "NAME", requires = "object")]
    instances: Vec<String>,

    /// Counter of --object (repeatable).
    #[arg(long = "counter", value_name = "NAME", requires = "object")]
    counters: Vec<String>,

    /// Collection interval in seconds. Overrides the config file.
    #[arg(short, long)]
    interval: Option<u64>,

    /// Collect once and exit.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["pdhmond", "pdhmon_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<DaemonConfig> {
    let mut config = match (&args.config, &args.object) {
        (Some(path), _) => DaemonConfig::load(path)?,
        (None, Some(object)) => {
            let group = CounterGroup::new(object.as_str())
                .with_instances(args.instances.iter().cloned())
                .with_counters(args.counters.iter().cloned());
            DaemonConfig::single(group, DEFAULT_INTERVAL_SECS)?
        }
        (None, None) => bail!("either --config or --object is required"),
    };
    if let Some(interval) = args.interval {
        if interval == 0 {
            bail!("interval must be at least one second");
        }
        config.interval_secs = interval;
    }
    Ok(config)
}

/// Builds one collector per group; the first construction error aborts.
fn build_collectors<A: PdhApi + Clone>(
    api: &A,
    groups: &[CounterGroup],
) -> Result<Vec<Collector<A>>> {
    groups
        .iter()
        .map(|group| {
            let collector = Collector::from_group(api.clone(), group)
                .with_context(|| format!("failed to set up collector for {}", group.object))?;
            info!(
                "Collector ready: {} ({} instances, {} counters)",
                group.object,
                group.instances.len().max(1),
                group.counters.len()
            );
            Ok(collector)
        })
        .collect()
}

/// One line of stdout output.
#[derive(Serialize)]
struct SnapshotLine<'a> {
    object: &'a str,
    timestamp: i64,
    instances: &'a HashMap<String, HashMap<String, ComputedValue>>,
}

fn write_snapshot<W: Write>(out: &mut W, object: &str, snapshot: &Snapshot) -> Result<()> {
    let line = SnapshotLine {
        object,
        timestamp: snapshot.timestamp,
        instances: &snapshot.instances,
    };
    serde_json::to_writer(&mut *out, &line)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Describes the contents of a snapshot for logging.
fn describe_snapshot(snapshot: &Snapshot) -> String {
    match snapshot.len() {
        0 => "no instances".to_string(),
        1 => format!("1 instance, {} values", snapshot.value_count()),
        n => format!("{} instances, {} values", n, snapshot.value_count()),
    }
}

/// Runs one cycle over every collector. Failed collectors skip this tick.
fn collect_all<A: PdhApi, W: Write>(collectors: &mut [Collector<A>], out: &mut W) -> usize {
    let mut written = 0;
    for collector in collectors.iter_mut() {
        match collector.collect() {
            Ok(snapshot) => {
                debug!(
                    "{}: {} at {}",
                    collector.object(),
                    describe_snapshot(&snapshot),
                    collector
                        .last_collection()
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default()
                );
                if let Some(timing) = collector.last_timing() {
                    debug!(
                        "{}: collect {:?}, fetch {:?}, {} skipped",
                        collector.object(),
                        timing.collect_query_data,
                        timing.fetch,
                        timing.skipped
                    );
                }
                match write_snapshot(out, collector.object(), &snapshot) {
                    Ok(()) => written += 1,
                    Err(e) => error!("Failed to write snapshot for {}: {}", collector.object(), e),
                }
            }
            Err(e) => {
                error!("Failed to collect {}: {}", collector.object(), e);
            }
        }
    }
    written
}

fn run<A: PdhApi + Clone>(api: A, args: &Args, config: &DaemonConfig) -> Result<()> {
    let mut collectors = build_collectors(&api, &config.groups)?;
    let stdout = io::stdout();

    if args.once {
        let written = collect_all(&mut collectors, &mut stdout.lock());
        if written < collectors.len() {
            bail!("{} of {} groups failed", collectors.len() - written, collectors.len());
        }
        return Ok(());
    }

    let interval = Duration::from_secs(config.interval_secs);

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting collection loop");

    let mut cycles: u64 = 0;
    while running.load(Ordering::SeqCst) {
        let written = collect_all(&mut collectors, &mut stdout.lock());
        cycles += 1;
        if cycles.is_multiple_of(60) {
            info!("Cycle #{}: {} of {} groups written", cycles, written, collectors.len());
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutting down...");
    for collector in collectors {
        collector.close();
    }
    info!("Shutdown complete");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = load_config(&args)?;

    info!("pdhmond {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, groups={}",
        config.interval_secs,
        config.groups.len()
    );

    #[cfg(windows)]
    let api = RealPdh::new();
    #[cfg(not(windows))]
    let api = {
        warn!("Not running on Windows, using mock performance counters");
        MockPdh::typical_system()
    };

    run(api, &args, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdhmon_core::collector::MockPdh;

    fn disk_group() -> CounterGroup {
        CounterGroup::new("LogicalDisk")
            .with_instances(["C:", "D:"])
            .with_counters(["% Free Space"])
    }

    #[test]
    fn test_describe_snapshot() {
        let api = MockPdh::logical_disk();
        let mut collectors = build_collectors(&api, &[disk_group()]).unwrap();
        let snapshot = collectors[0].collect().unwrap();

        assert_eq!(describe_snapshot(&snapshot), "2 instances, 2 values");
        assert_eq!(describe_snapshot(&Snapshot::empty(0)), "no instances");
    }

    #[test]
    fn test_write_snapshot_line() {
        let api = MockPdh::system_uptime();
        let group = CounterGroup::new("System").with_counters(["System Up Time"]);
        let mut collectors = build_collectors(&api, &[group]).unwrap();
        let snapshot = collectors[0].collect().unwrap();

        let mut out = Vec::new();
        write_snapshot(&mut out, "System", &snapshot).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["object"], "System");
        assert_eq!(value["instances"]["------"]["System Up Time"]["first"], 5.0);
        assert_eq!(value["instances"]["------"]["System Up Time"]["kind"], "gauge");
    }

    #[test]
    fn test_collect_all_skips_failed_groups() {
        let api = MockPdh::typical_system();
        let groups = [
            disk_group(),
            CounterGroup::new("System").with_counters(["Processes"]),
        ];
        let mut collectors = build_collectors(&api, &groups).unwrap();

        let mut out = Vec::new();
        assert_eq!(collect_all(&mut collectors, &mut out), 2);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);

        api.set_fetch_status(
            "\\LogicalDisk(C:)\\% Free Space",
            Some(pdhmon_core::collector::PdhStatus::INVALID_HANDLE),
        );
        let mut out = Vec::new();
        assert_eq!(collect_all(&mut collectors, &mut out), 1);
        assert!(String::from_utf8(out).unwrap().contains("\"object\":\"System\""));
    }

    #[test]
    fn test_build_collectors_fails_fast() {
        let api = MockPdh::typical_system();
        let groups = [
            disk_group(),
            CounterGroup::new("LogicalDisk").with_counters(["*"]),
        ];

        let err = build_collectors(&api, &groups).err().unwrap();

        assert!(format!("{:#}", err).contains("wildcard"));
        assert_eq!(api.open_query_count(), 0);
        assert_eq!(api.open_counter_count(), 0);
    }

    #[test]
    fn test_args_single_group() {
        let args = Args::parse_from([
            "pdhmond",
            "--object",
            "LogicalDisk",
            "--instance",
            "C:",
            "--instance",
            "D:",
            "--counter",
            "% Free Space",
            "--interval",
            "3",
        ]);

        let config = load_config(&args).unwrap();

        assert_eq!(config.interval_secs, 3);
        assert_eq!(config.groups, vec![disk_group()]);
    }

    #[test]
    fn test_args_require_a_source() {
        let args = Args::parse_from(["pdhmond"]);
        assert!(load_config(&args).is_err());
        assert!(Args::try_parse_from(["pdhmond", "--counter", "Processes"]).is_err());
    }
}
