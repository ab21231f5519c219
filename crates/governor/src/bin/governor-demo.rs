//! governor-demo: replays command bursts against a simulated device.
//!
//! Every configured selector receives a burst of writes on channel 1, spaced
//! a few milliseconds apart. The simulated device takes `--latency-ms` per
//! write. Outcomes per submission and the scheduler counters are logged.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{info, warn};

use stupid_governor::{Dispatcher, Execution, GovernorConfig, Submission};

// ── CLI ─────────────────────────────────────────────────────────────

/// Replay bursts of device commands through the configured policies.
#[derive(Parser, Debug)]
#[command(name = "governor-demo", version, about)]
struct Cli {
    /// Path to governor.toml config file.
    #[arg(long, env = "GOVERNOR_CONFIG", default_value = "config/governor.toml")]
    config: String,

    /// Commands per selector.
    #[arg(long, default_value_t = 5)]
    burst: usize,

    /// Gap between two commands of a burst, in milliseconds.
    #[arg(long, default_value_t = 5)]
    gap_ms: u64,

    /// Simulated device latency per write, in milliseconds.
    #[arg(long, env = "GOVERNOR_DEMO_LATENCY_MS", default_value_t = 30)]
    latency_ms: u64,
}

// ── Simulated device ────────────────────────────────────────────────

/// One register write.
#[derive(Debug)]
struct Write {
    register: String,
    value: Value,
}

/// Register file that applies writes after a fixed latency.
#[derive(Default)]
struct Device {
    registers: Mutex<BTreeMap<String, Value>>,
    writes: Mutex<u64>,
}

impl Device {
    fn apply(&self, write: Write) -> Value {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        self.registers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(write.register, write.value.clone());
        write.value
    }

    fn writes(&self) -> u64 {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self) -> BTreeMap<String, Value> {
        self.registers.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// How long to wait for one submission: a write per burst round plus slack.
fn reply_deadline(latency: Duration, burst: usize) -> Duration {
    let rounds = u32::try_from(burst).unwrap_or(u32::MAX).saturating_add(1);
    latency
        .saturating_mul(rounds)
        .saturating_add(Duration::from_secs(1))
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stupid_governor=info,governor_demo=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match GovernorConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded governor config");
            cfg
        }
        Err(e) => {
            warn!(error = %e, path = %cli.config, "failed to load config, using defaults");
            GovernorConfig::default()
        }
    };
    config.log_summary();

    let device = Arc::new(Device::default());
    let latency = Duration::from_millis(cli.latency_ms);
    let executor = {
        let device = Arc::clone(&device);
        move |write: Write| {
            let device = Arc::clone(&device);
            Execution::deferred(async move {
                tokio::time::sleep(latency).await;
                Ok(device.apply(write))
            })
        }
    };
    let dispatcher = Dispatcher::from_config(&config, executor)?;

    let mut selectors: Vec<String> = config.selectors.keys().cloned().collect();
    if selectors.is_empty() {
        selectors.push("set_gain".to_string());
    }

    let mut submissions: Vec<(String, usize, Submission)> = Vec::new();
    for i in 0..cli.burst {
        for selector in &selectors {
            let write = Write {
                register: format!("{selector}/1"),
                value: json!(i),
            };
            let submission = dispatcher.submit(selector.clone(), vec![json!(1)], write);
            submissions.push((selector.clone(), i, submission));
        }
        tokio::time::sleep(Duration::from_millis(cli.gap_ms)).await;
    }

    // Cancelled submissions never settle in silent mode; bound the wait.
    let deadline = reply_deadline(latency, cli.burst);
    let outcomes = join_all(submissions.into_iter().map(|(selector, i, submission)| async move {
        let task_id = submission.task_id();
        (selector, i, task_id, tokio::time::timeout(deadline, submission).await)
    }))
    .await;
    for (selector, i, task_id, outcome) in outcomes {
        match outcome {
            Ok(Ok(value)) => info!(%selector, command = i, ?task_id, %value, "written"),
            Ok(Err(error)) => info!(%selector, command = i, ?task_id, %error, "not written"),
            Err(_) => info!(%selector, command = i, ?task_id, "dropped by policy"),
        }
    }

    info!(
        commands = cli.burst * selectors.len(),
        device_writes = device.writes(),
        "burst replay finished"
    );
    println!("{}", serde_json::to_string_pretty(&dispatcher.scheduler().stats())?);
    println!("{}", serde_json::to_string_pretty(&device.snapshot())?);
    Ok(())
}
