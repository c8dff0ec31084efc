//! Recurring shift assignment
//!
//! Runs the assigner once on start and then on every interval tick until
//! shutdown. Each tick opens its own store on the blocking pool; a failed
//! tick is logged and the next one retries.

use anyhow::Result;
use std::future::Future;
use std::path::PathBuf;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::config::Config;
use crate::shift::{ShiftAssigner, WindowResolution};
use crate::store::PlantStore;

/// Run until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    run_until(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
    })
    .await
}

/// Run until `shutdown` completes
pub async fn run_until<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let db_path = config.database_path();
    let resolution = config.shifts.resolution;
    let period = config.assign_interval();

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(db = %db_path.display(), every_secs = period.as_secs(), "scheduler started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("scheduler stopping");
                return Ok(());
            }
            _ = ticker.tick() => {
                let path = db_path.clone();
                match tokio::task::spawn_blocking(move || assign_once(path, resolution)).await {
                    Ok(Ok(assigned)) => info!(assigned, "scheduled shift assignment done"),
                    Ok(Err(e)) => error!(error = %e, "scheduled shift assignment failed"),
                    Err(e) => error!(error = %e, "shift assignment task panicked"),
                }
            }
        }
    }
}

fn assign_once(db_path: PathBuf, resolution: WindowResolution) -> Result<usize> {
    let store = PlantStore::open(&db_path)?;
    ShiftAssigner::new(&store, resolution).assign()
}
