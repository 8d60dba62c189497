//! Demo driver: runs the scheduler against a simulated resource launcher.
//!
//! The launcher fails its first couple of opens (to exercise retry) and
//! reports each opened resource as done after a short dwell, standing in for
//! the human who would normally finish the page and hit the done button.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tracing::info;
use url::Url;

use drover_core::domain::{HandleId, Signal};
use drover_core::impls::JsonFileStore;
use drover_core::ports::{ResourceLauncher, SystemClock};
use drover_core::{DroverError, Scheduler, SchedulerConfig};

struct SimulatedLauncher {
    next_handle: AtomicU64,
    remaining_failures: AtomicU32,
    dwell: Duration,
    signals: mpsc::Sender<Signal>,
    live: Mutex<HashSet<HandleId>>,
}

impl SimulatedLauncher {
    fn new(signals: mpsc::Sender<Signal>, failures: u32, dwell: Duration) -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            remaining_failures: AtomicU32::new(failures),
            dwell,
            signals,
            live: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl ResourceLauncher for SimulatedLauncher {
    async fn open(&self, url: &Url) -> Result<HandleId, DroverError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(DroverError::Launcher(format!(
                "intentional open failure (left={left})"
            )));
        }

        let handle = HandleId::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.live.lock().unwrap().insert(handle);
        println!("opened {url} as {handle}");

        // Pretend someone works the page and then marks it done.
        let signals = self.signals.clone();
        let dwell = self.dwell;
        tokio::spawn(async move {
            sleep(dwell).await;
            let _ = signals.send(Signal::Done { handle }).await;
        });

        Ok(handle)
    }

    async fn close(&self, handle: HandleId) -> Result<(), DroverError> {
        self.live.lock().unwrap().remove(&handle);
        Ok(())
    }

    async fn is_live(&self, handle: HandleId) -> bool {
        self.live.lock().unwrap().contains(&handle)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        urls = vec![
            "https://example.com/one".to_string(),
            "https://example.com/two".to_string(),
            "not a url".to_string(),
            "https://example.com/three".to_string(),
        ];
    }

    // (A) Wire the scheduler to the simulated launcher and a JSON file store.
    let (signal_tx, mut signal_rx) = mpsc::channel(32);
    let launcher = Arc::new(SimulatedLauncher::new(
        signal_tx,
        2,
        Duration::from_millis(300),
    ));
    let store = Arc::new(JsonFileStore::new("drover-state.json"));

    // (B) Restore reconciles any state left by a previous run against the
    // launcher's live resources before dispatch resumes.
    let scheduler = Scheduler::restore(
        launcher,
        store,
        Arc::new(SystemClock),
        SchedulerConfig::default(),
    )
    .await?;

    // (C) Submit the batch.
    let receipt = scheduler.enqueue(&urls).await?;
    info!(
        accepted = receipt.accepted,
        rejected = receipt.rejected,
        "batch submitted"
    );

    // (D) Pump completion signals and poll until the batch drains.
    loop {
        tokio::select! {
            Some(signal) = signal_rx.recv() => {
                scheduler.deliver(signal).await?;
            }
            _ = sleep(Duration::from_millis(200)) => {
                let status = scheduler.status().await;
                info!(
                    active = status.active,
                    pending = status.pending,
                    retrying = status.retrying,
                    completed = status.completed,
                    failed = status.failed,
                    "progress"
                );
                if status.active == 0
                    && status.pending == 0
                    && status.retrying == 0
                    && !status.paused
                {
                    break;
                }
            }
        }
    }

    let status = scheduler.status().await;
    println!("final status: {}", serde_json::to_string(&status)?);
    Ok(())
}
