//! Background run management
//!
//! Owns the single in-flight generation run. The worker is a tokio task so the
//! foreground (CLI loop, future UI) stays responsive while validation waits on
//! the network; it only ever talks back through the progress channel.
//!
//! A supervising task awaits the worker. If the worker panics or is aborted
//! before reporting, the supervisor sends the run's single `Error` event so
//! the consumer never waits on a silent channel.

use crate::error::{GenerationError, GenerationResult};
use crate::generator::{CandidateGenerator, GenerationRequest, GenerationRun};
use crate::progress::{progress_channel, GenerationEvent, ProgressReceiver};
use harpia_common::Observation;
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

struct ActiveRun {
    run_id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<Result<GenerationRun, JoinError>>,
}

/// Starts, cancels and joins generation runs, one at a time
#[derive(Default)]
pub struct GenerationController {
    active: Mutex<Option<ActiveRun>>,
}

impl GenerationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a run on the runtime
    ///
    /// Returns the run id and the receiving end of its progress channel.
    /// Fails with [`GenerationError::AlreadyRunning`] while a previous run
    /// has not finished.
    pub async fn start(
        &self,
        generator: Arc<CandidateGenerator>,
        observations: Vec<Observation>,
        request: GenerationRequest,
        mut rng: StdRng,
    ) -> GenerationResult<(Uuid, ProgressReceiver)> {
        let mut active = self.active.lock().await;

        if let Some(run) = active.as_ref() {
            if !run.handle.is_finished() {
                return Err(GenerationError::AlreadyRunning);
            }
        }

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (tx, rx) = progress_channel();

        let token = cancel.clone();
        let worker_tx = tx.clone();
        let worker = tokio::spawn(async move {
            generator
                .execute(&observations, request, &mut rng, &worker_tx, &token)
                .await
        });

        let handle = tokio::spawn(async move {
            let result = worker.await;
            if let Err(e) = &result {
                error!(%run_id, error = %e, "Generation worker died before reporting");
                tx.send(GenerationEvent::Error(format!("Generation worker failed: {}", e)));
            }
            result
        });

        info!(%run_id, requested = request.requested, "Generation run spawned");
        *active = Some(ActiveRun {
            run_id,
            cancel,
            handle,
        });

        Ok((run_id, rx))
    }

    /// Ask the active run to stop; it reports `Error` and persists nothing
    pub async fn cancel(&self) -> bool {
        match self.active.lock().await.as_ref() {
            Some(run) if !run.handle.is_finished() => {
                info!(run_id = %run.run_id, "Cancelling generation run");
                run.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|run| !run.handle.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the active run and release the slot
    pub async fn join(&self) -> Option<GenerationRun> {
        let run = self.active.lock().await.take()?;

        match run.handle.await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) | Err(e) => {
                error!(run_id = %run.run_id, error = %e, "Generation run ended without a result");
                None
            }
        }
    }
}
