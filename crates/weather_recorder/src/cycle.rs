//! One fetch-then-save invocation, and the loop that schedules them.

use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;

use crate::acquirer::{Acquirer, ObservationSource};
use crate::error::{CycleError, FetchError};
use crate::recorder::{Recorder, SaveOutcome};
use crate::schedule::Cadence;
use crate::store::ObservationStore;

/// Fetch the latest observation and record it.
///
/// A store failure triggers one store repair and one retry of the save;
/// a second failure is surfaced. The fetch is never repeated here.
pub async fn run_cycle<S, R, T>(
    acquirer: &mut Acquirer<S, R>,
    recorder: &Recorder<T>,
) -> Result<SaveOutcome, CycleError>
where
    S: ObservationSource,
    R: Rng + Send,
    T: ObservationStore,
{
    let observation = acquirer.fetch().await?;
    log::info!("Successful data retrieval: {}", observation);

    match recorder.save(observation.clone()) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            log::warn!("Save failed ({}), repairing store and retrying once", e);
            recorder.repair()?;
            Ok(recorder.save(observation)?)
        }
    }
}

/// Run a cycle now and then once per cadence tick until shutdown.
///
/// A failed cycle is logged and the loop waits for the next tick.
/// Returns the number of cycles that completed successfully.
pub async fn run_schedule<S, R, T>(
    acquirer: &mut Acquirer<S, R>,
    recorder: &Recorder<T>,
    cadence: &Cadence,
    mut shutdown: watch::Receiver<()>,
) -> usize
where
    S: ObservationSource,
    R: Rng + Send,
    T: ObservationStore,
{
    let mut completed = 0;

    loop {
        let started = Utc::now();
        match run_cycle(acquirer, recorder).await {
            Ok(SaveOutcome::Inserted { id }) => {
                completed += 1;
                log::info!("Cycle complete, new record {}", id);
            }
            Ok(SaveOutcome::AlreadyRecorded) => {
                completed += 1;
                log::info!("Cycle complete, observation already recorded");
            }
            Err(CycleError::Fetch(FetchError::Cancelled)) => {
                log::info!("Cycle cancelled, exiting");
                break;
            }
            Err(e) => log::error!("Cycle failed, waiting for next tick: {}", e),
        }

        let next = match cadence.next_run(started) {
            Ok(next) => next,
            Err(e) => {
                log::error!("Failed to compute next run: {}", e);
                break;
            }
        };
        let delay = (next - Utc::now()).to_std().unwrap_or_default();
        log::info!("Next observation at {}", next.to_rfc3339());

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                log::info!("Shutdown signal received, exiting");
                break;
            }
        }
    }

    completed
}
