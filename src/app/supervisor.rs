//! Run supervisor: owns the detection worker's lifecycle.
//!
//! `start()` launches the detection loop on a dedicated worker task;
//! `stop()` requests cooperative cancellation and force-aborts after a
//! grace period. The supervisor and worker share only the state cell and
//! the cancellation token - matrices and market data live entirely inside
//! the worker. Every exit path converges to `stopped` or `error`; the
//! supervisor is never left in an ambiguous running state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::solver::MipSolver;
use crate::domain::{CandidateCycle, OpportunityRecord, SizingOutcome, VenueId};
use crate::error::Result;
use crate::model::{DetectorParams, ModelSettings, OpportunityModel};
use crate::pricing::ReferencePriceSource;
use crate::venue::MarketDataGateway;

use super::sizing::CycleSizer;
use super::state::{RunState, StatusSnapshot, SupervisorState};

/// Detection loop timing.
#[derive(Debug, Clone)]
pub struct LoopSchedule {
    /// Pause between detection iterations.
    pub iteration_interval: Duration,
    /// How long `stop()` waits for a graceful exit before aborting.
    pub stop_grace: Duration,
}

impl LoopSchedule {
    fn from_config(config: &Config) -> Self {
        Self {
            iteration_interval: Duration::from_secs(config.supervisor.iteration_interval_secs),
            stop_grace: Duration::from_secs(config.supervisor.stop_grace_secs),
        }
    }
}

struct WorkerHandle {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Owns configuration and the detection worker; exposes lifecycle calls
/// to the surrounding application.
pub struct Supervisor {
    venues: HashMap<VenueId, Arc<dyn MarketDataGateway>>,
    prices: Arc<dyn ReferencePriceSource>,
    solver: Arc<dyn MipSolver>,
    sizer: Option<Arc<dyn CycleSizer>>,
    /// Immutable baseline built once from configuration.
    settings: ModelSettings,
    schedule: LoopSchedule,
    /// Parameter set for the next run: defaults plus staged overrides.
    next_params: RwLock<DetectorParams>,
    state: Arc<SupervisorState>,
    worker: Mutex<Option<WorkerHandle>>,
    history_file: Option<PathBuf>,
}

impl Supervisor {
    pub fn new(
        venues: HashMap<VenueId, Arc<dyn MarketDataGateway>>,
        prices: Arc<dyn ReferencePriceSource>,
        solver: Arc<dyn MipSolver>,
        config: &Config,
    ) -> Self {
        let settings = ModelSettings::from_config(config);
        let next_params = RwLock::new(settings.params.clone());
        Self {
            venues,
            prices,
            solver,
            sizer: None,
            settings,
            schedule: LoopSchedule::from_config(config),
            next_params,
            state: Arc::new(SupervisorState::new()),
            worker: Mutex::new(None),
            history_file: config.supervisor.history_file.clone(),
        }
    }

    /// Attach a sizing stage; without one, detected opportunities are
    /// recorded without a sizing outcome.
    pub fn with_sizer(mut self, sizer: Arc<dyn CycleSizer>) -> Self {
        self.sizer = Some(sizer);
        self
    }

    /// Override the loop schedule (tests use short intervals).
    pub fn with_schedule(mut self, schedule: LoopSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Stage parameter overrides for the next run.
    ///
    /// Overrides are applied on top of the configured defaults, field by
    /// field; malformed fields fall back to their default with a warning
    /// and the call always succeeds. Returns the effective parameter set.
    pub fn set_parameters(&self, overrides: &serde_json::Map<String, Value>) -> DetectorParams {
        let params = self.settings.params.with_overrides(overrides);
        *self.next_params.write() = params.clone();
        info!("Detection parameters staged for next run");
        params
    }

    /// Launch the detection worker.
    ///
    /// Rejected with the current status attached when a worker is already
    /// alive. Clears the previous run's error and last opportunity, stages
    /// any provided overrides, and transitions through `starting`.
    pub async fn start(&self, overrides: Option<&serde_json::Map<String, Value>>) -> StatusSnapshot {
        {
            let mut worker = self.worker.lock();

            if let Some(existing) = worker.as_ref() {
                if !existing.handle.is_finished() {
                    warn!("start() ignored: detection worker already running");
                    drop(worker);
                    return self.status();
                }
            }

            if let Some(overrides) = overrides {
                self.set_parameters(overrides);
            }
            let params = self.next_params.read().clone();

            self.state.reset_for_start();

            let cancel = CancellationToken::new();
            let ctx = WorkerContext {
                venues: self.venues.clone(),
                prices: self.prices.clone(),
                solver: self.solver.clone(),
                sizer: self.sizer.clone(),
                settings: self.settings.clone().with_params(params),
                schedule: self.schedule.clone(),
                state: self.state.clone(),
                cancel: cancel.clone(),
                history_file: self.history_file.clone(),
            };

            let handle = tokio::spawn(detection_loop(ctx));
            *worker = Some(WorkerHandle { handle, cancel });
            info!("Detection worker started");
        }

        self.status()
    }

    /// Stop the detection worker.
    ///
    /// A no-op with a warning when no worker is alive. Otherwise signals
    /// cancellation, waits up to the grace period for a clean exit, and
    /// force-aborts the worker if it overstays. The final state is
    /// `stopped` unless the worker already recorded `error`.
    pub async fn stop(&self) -> StatusSnapshot {
        let taken = self.worker.lock().take();

        let Some(worker) = taken else {
            warn!("stop() ignored: no detection worker is alive");
            if !matches!(
                self.state.state(),
                RunState::Idle | RunState::Stopped | RunState::Error
            ) {
                self.state.set_state(RunState::Stopped);
            }
            return self.status();
        };

        if worker.handle.is_finished() {
            let _ = worker.handle.await;
            if !matches!(self.state.state(), RunState::Stopped | RunState::Error) {
                self.state.set_state(RunState::Stopped);
            }
            return self.status();
        }

        self.state.set_state(RunState::Stopping);
        worker.cancel.cancel();

        let mut handle = worker.handle;
        match tokio::time::timeout(self.schedule.stop_grace, &mut handle).await {
            Ok(join) => {
                if let Err(e) = join {
                    error!(error = %e, "Detection worker join failed");
                }
            }
            Err(_) => {
                warn!(
                    grace_secs = self.schedule.stop_grace.as_secs(),
                    "Worker did not stop within grace period; aborting"
                );
                handle.abort();
                let _ = handle.await;
            }
        }

        if self.state.state() != RunState::Error {
            self.state.set_state(RunState::Stopped);
        }

        self.status()
    }

    /// Current state, last error, last opportunity, and worker liveness.
    ///
    /// Failure detection is lazy: a worker found dead here without a stop
    /// having been issued transitions the state to `error`.
    pub fn status(&self) -> StatusSnapshot {
        let worker = self.worker.lock();
        let alive = worker.as_ref().is_some_and(|w| !w.handle.is_finished());

        if let Some(w) = worker.as_ref() {
            if w.handle.is_finished()
                && !matches!(
                    self.state.state(),
                    RunState::Idle | RunState::Stopping | RunState::Stopped | RunState::Error
                )
            {
                warn!("Detection worker found dead without a stop; marking error");
                self.state
                    .set_error("detection worker exited unexpectedly");
                self.state.set_state(RunState::Error);
            }
        }

        StatusSnapshot {
            state: self.state.state(),
            error: self.state.error(),
            last_opportunity: self.state.last_opportunity(),
            worker_alive: alive,
            pid: alive.then(std::process::id),
        }
    }

    /// The append-only opportunity history, oldest first.
    pub fn history(&self) -> Vec<OpportunityRecord> {
        self.state.history()
    }
}

/// Everything the worker task owns for one run.
struct WorkerContext {
    venues: HashMap<VenueId, Arc<dyn MarketDataGateway>>,
    prices: Arc<dyn ReferencePriceSource>,
    solver: Arc<dyn MipSolver>,
    sizer: Option<Arc<dyn CycleSizer>>,
    settings: ModelSettings,
    schedule: LoopSchedule,
    state: Arc<SupervisorState>,
    cancel: CancellationToken,
    history_file: Option<PathBuf>,
}

async fn detection_loop(ctx: WorkerContext) {
    match run_detection(&ctx).await {
        Ok(()) => {
            if ctx.cancel.is_cancelled() {
                info!("Detection loop stopped");
            } else {
                warn!("Detection loop exited without a stop request");
            }
            ctx.state.set_state(RunState::Stopped);
        }
        Err(e) => {
            error!(error = %e, "Detection loop failed");
            ctx.state.set_error(e.to_string());
            ctx.state.set_state(RunState::Error);
        }
    }
}

async fn run_detection(ctx: &WorkerContext) -> Result<()> {
    let mut model = OpportunityModel::new(
        ctx.venues.clone(),
        ctx.prices.clone(),
        ctx.solver.clone(),
        ctx.settings.clone(),
    )?;

    ctx.state.set_state(RunState::Running);

    model.initialize_universe().await?;
    model.build_variables().await?;

    while !ctx.cancel.is_cancelled() {
        match model.detect_cycle(&ctx.cancel).await? {
            Some(cycle) => {
                ctx.state.set_state(RunState::FoundOpportunity);

                let sizing = size_cycle(ctx, &cycle).await;
                match &sizing {
                    Some(SizingOutcome::SimulatedExecution { .. }) => {
                        ctx.state.set_state(RunState::ExecutedTradeSimulation);
                    }
                    Some(SizingOutcome::NoWorkableSolution) => {
                        ctx.state.set_state(RunState::OpportunityNoWorkableSolution);
                    }
                    None => {}
                }

                let record = OpportunityRecord::new(&cycle, sizing);
                append_history_line(ctx.history_file.as_deref(), &record);
                ctx.state.record_opportunity(record);
            }
            None => {
                ctx.state.set_state(RunState::RunningNoOpportunity);
            }
        }

        if wait_or_cancelled(ctx.schedule.iteration_interval, &ctx.cancel).await {
            break;
        }
    }

    Ok(())
}

async fn size_cycle(ctx: &WorkerContext, cycle: &CandidateCycle) -> Option<SizingOutcome> {
    let sizer = ctx.sizer.as_ref()?;
    match sizer
        .size(cycle, ctx.settings.params.order_book_depth)
        .await
    {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!(sizer = sizer.name(), error = %e, "Sizing stage failed");
            None
        }
    }
}

/// Interruptible inter-iteration sleep; `true` means a stop was requested.
async fn wait_or_cancelled(interval: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(interval) => false,
    }
}

fn append_history_line(path: Option<&Path>, record: &OpportunityRecord) {
    let Some(path) = path else {
        return;
    };

    let line = match serde_json::to_string(record) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "Failed to serialize history record");
            return;
        }
    };

    let write = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| {
            use std::io::Write;
            writeln!(file, "{line}")
        });

    if let Err(e) = write {
        warn!(path = %path.display(), error = %e, "Failed to append history record");
    }
}
