//! Replanning: triggering, scheduling and applying global searches
//!
//! Searches run on a background thread against a snapshot of the
//! configuration space. The control loop only waits for as long as the
//! scheduling policy allows; with dynamic priority a search may keep running
//! into the next iteration and is joined there.

use std::ops::Index;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use itertools::Itertools;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::common::{Configuration, ConfigurationSpace, MotionStatus, PlannerFactory, RoboticsError};
use crate::dynamic_planning::config::RealTimeScheduling;
use crate::dynamic_planning::drgbt::DrgbtPlanner;
use crate::dynamic_planning::horizon::Horizon;
use crate::dynamic_planning::telemetry::Routine;

/// Path from the last successful global search, densified so that
/// neighbouring states are at most one bounded step apart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredefinedPath {
    states: Vec<Configuration>,
}

impl PredefinedPath {
    pub fn densify(path: &[Configuration], max_step: f64) -> Self {
        let mut states = Vec::with_capacity(path.len());
        if let Some(first) = path.first() {
            states.push(first.clone());
        }
        for (a, b) in path.iter().tuple_windows() {
            let dist = a.distance(b);
            if dist <= 0.0 {
                continue;
            }
            let num_steps = (dist / max_step).ceil().max(1.0) as usize;
            for k in 1..num_steps {
                states.push(a.lerp(b, k as f64 / num_steps as f64));
            }
            states.push(b.clone());
        }
        Self { states }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[Configuration] {
        &self.states
    }
}

impl Index<usize> for PredefinedPath {
    type Output = Configuration;

    fn index(&self, index: usize) -> &Configuration {
        &self.states[index]
    }
}

/// What a background search sends back
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub planner: String,
    pub solved: bool,
    pub path: Vec<Configuration>,
    pub planning_time: Duration,
}

/// Why a replanning attempt produced no path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplanFailure {
    /// Nothing left of the iteration to plan with
    NoBudget,
    /// The search gave up or found nothing
    SearchFailed,
    /// The search overran its budget
    DeadlineMissed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplanOutcome {
    Replanned { path: Vec<Configuration>, planning_time: Duration },
    Failed(ReplanFailure),
    /// The search is still running and will be joined in a later iteration
    Pending,
}

struct InFlightSearch {
    receiver: Receiver<SearchReport>,
    cancel: Arc<AtomicBool>,
    launched: Instant,
    budget: Duration,
}

impl InFlightSearch {
    fn deadline(&self) -> Instant {
        self.launched + self.budget
    }

    /// Raise the cancel flag; the thread is detached and its report dropped
    fn cancel(self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Decides when to replan and runs global searches under the scheduling policy
pub struct ReplanScheduler<S: ConfigurationSpace> {
    policy: RealTimeScheduling,
    factory: Box<dyn PlannerFactory<S>>,
    /// Slice of the next iteration a dynamic-priority search may borrow
    reserved: Duration,
    replanning: bool,
    in_flight: Option<InFlightSearch>,
}

impl<S: ConfigurationSpace> ReplanScheduler<S> {
    pub fn new(policy: RealTimeScheduling, factory: Box<dyn PlannerFactory<S>>, reserved: Duration) -> Self {
        Self {
            policy,
            factory,
            reserved,
            replanning: false,
            in_flight: None,
        }
    }

    pub fn planner_name(&self) -> String {
        self.factory.name()
    }

    pub fn is_replanning_required(&self) -> bool {
        self.replanning
    }

    pub fn require_replanning(&mut self) {
        self.replanning = true;
    }

    /// Clear the replanning request; a search still in flight becomes stale and is cancelled
    pub fn clear_replanning(&mut self) {
        self.replanning = false;
        if let Some(search) = self.in_flight.take() {
            warn!("replanning no longer required, discarding background search");
            search.cancel();
        }
    }

    /// Whether a search launched in an earlier iteration has not been joined yet
    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Replan when already requested or when the horizon looks poor overall
    pub fn whether_to_replan(&self, horizon: &Horizon, weight_min: f64, weight_mean_min: f64) -> bool {
        if self.replanning || horizon.is_empty() {
            return true;
        }
        horizon.max_weight() <= weight_min && horizon.mean_weight() <= weight_mean_min
    }

    /// Run (or join) a search from `start` to `goal` given the time left in the iteration
    pub fn replan(
        &mut self,
        space: &S,
        start: &Configuration,
        goal: &Configuration,
        seed: u64,
        remaining: Duration,
    ) -> ReplanOutcome {
        if let Some(search) = self.in_flight.take() {
            return self.join(search, remaining);
        }

        let budget = match self.policy {
            RealTimeScheduling::Dynamic => remaining + self.reserved,
            RealTimeScheduling::Fixed | RealTimeScheduling::Unscheduled => remaining,
        };
        let wait = remaining;
        self.run(space, start, goal, seed, budget, wait, self.policy == RealTimeScheduling::Dynamic)
    }

    /// Run a search and block for the whole of `budget`
    pub fn replan_blocking(
        &mut self,
        space: &S,
        start: &Configuration,
        goal: &Configuration,
        seed: u64,
        budget: Duration,
    ) -> ReplanOutcome {
        if let Some(search) = self.in_flight.take() {
            search.cancel();
        }
        self.run(space, start, goal, seed, budget, budget, false)
    }

    /// Cancel whatever is still running
    pub fn abandon(&mut self) {
        if let Some(search) = self.in_flight.take() {
            search.cancel();
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &mut self,
        space: &S,
        start: &Configuration,
        goal: &Configuration,
        seed: u64,
        budget: Duration,
        wait: Duration,
        may_defer: bool,
    ) -> ReplanOutcome {
        if budget.is_zero() {
            self.replanning = true;
            return ReplanOutcome::Failed(ReplanFailure::NoBudget);
        }

        let search = self.launch(space.clone(), start.clone(), goal.clone(), seed, budget);
        let received = search.receiver.recv_timeout(wait);
        match received {
            Ok(report) => self.evaluate(&search, report),
            Err(RecvTimeoutError::Timeout) if may_defer => {
                debug!(?budget, "search continues into the next iteration");
                self.replanning = true;
                self.in_flight = Some(search);
                ReplanOutcome::Pending
            }
            Err(RecvTimeoutError::Timeout) => {
                search.cancel();
                self.replanning = true;
                ReplanOutcome::Failed(ReplanFailure::DeadlineMissed)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.replanning = true;
                ReplanOutcome::Failed(ReplanFailure::SearchFailed)
            }
        }
    }

    fn join(&mut self, search: InFlightSearch, remaining: Duration) -> ReplanOutcome {
        let wait = remaining.min(search.deadline().saturating_duration_since(Instant::now()));
        let received = search.receiver.recv_timeout(wait);
        match received {
            Ok(report) => self.evaluate(&search, report),
            Err(RecvTimeoutError::Timeout) if Instant::now() < search.deadline() => {
                self.in_flight = Some(search);
                ReplanOutcome::Pending
            }
            Err(RecvTimeoutError::Timeout) => {
                search.cancel();
                self.replanning = true;
                ReplanOutcome::Failed(ReplanFailure::DeadlineMissed)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.replanning = true;
                ReplanOutcome::Failed(ReplanFailure::SearchFailed)
            }
        }
    }

    fn evaluate(&mut self, search: &InFlightSearch, report: SearchReport) -> ReplanOutcome {
        debug!(
            planner = %report.planner,
            solved = report.solved,
            planning_time = ?report.planning_time,
            "search finished"
        );
        if !report.solved || report.path.is_empty() {
            self.replanning = true;
            ReplanOutcome::Failed(ReplanFailure::SearchFailed)
        } else if report.planning_time > search.budget {
            self.replanning = true;
            ReplanOutcome::Failed(ReplanFailure::DeadlineMissed)
        } else {
            self.replanning = false;
            ReplanOutcome::Replanned { path: report.path, planning_time: report.planning_time }
        }
    }

    fn launch(
        &self,
        space: S,
        start: Configuration,
        goal: Configuration,
        seed: u64,
        budget: Duration,
    ) -> InFlightSearch {
        let (sender, receiver) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut planner = self.factory.create(space, start, goal, seed);

        let cancel_flag = Arc::clone(&cancel);
        thread::spawn(move || {
            let solved = planner.solve(budget, &cancel_flag);
            let report = SearchReport {
                planner: planner.name().to_string(),
                solved,
                path: if solved { planner.path().to_vec() } else { Vec::new() },
                planning_time: planner.planning_time(),
            };
            // The receiver is gone when the search was cancelled
            let _ = sender.send(report);
        });

        InFlightSearch { receiver, cancel, launched: Instant::now(), budget }
    }
}

impl<S: ConfigurationSpace> DrgbtPlanner<S> {
    /// Replan from the current configuration with what is left of the iteration
    pub(crate) fn replan(&mut self, remaining: Duration) -> ReplanOutcome {
        let seed = self.rng.gen();
        let outcome = self.scheduler.replan(&self.space, &self.q_current, &self.goal, seed, remaining);
        self.apply_replan_outcome(&outcome);
        outcome
    }

    /// First search before the control loop starts, blocking for a full iteration
    pub(crate) fn replan_initial(&mut self) -> ReplanOutcome {
        let seed = self.rng.gen();
        let budget = self.config.max_iter_time();
        let outcome = self.scheduler.replan_blocking(&self.space, &self.q_current, &self.goal, seed, budget);
        self.apply_replan_outcome(&outcome);
        outcome
    }

    fn apply_replan_outcome(&mut self, outcome: &ReplanOutcome) {
        match outcome {
            ReplanOutcome::Replanned { path, planning_time } => {
                let max_step = (self.space.num_dimensions() as f64).sqrt() * self.config.step;
                self.predefined_path = PredefinedPath::densify(path, max_step);
                self.horizon.clear();
                self.q_next = self.horizon.create_state(self.q_current.clone(), Some(0));
                self.status = MotionStatus::Reached;
                self.planner_info.add_routine_time(Routine::Replan, *planning_time);
                self.planner_info.record_replan(true);
                info!(
                    planner = %self.scheduler.planner_name(),
                    ?planning_time,
                    num_states = self.predefined_path.len(),
                    "new predefined path"
                );
            }
            ReplanOutcome::Failed(reason) => {
                self.planner_info.record_replan(false);
                let err = RoboticsError::ReplanUnavailable(format!("{:?}", reason));
                warn!(%err, "keeping the previous predefined path");
            }
            ReplanOutcome::Pending => {
                debug!("waiting for the background search");
            }
        }
    }
}
