//! Run statistics collected by the controller

use std::collections::BTreeMap;
use std::time::Duration;

/// Timed stages of a control iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Routine {
    Replan,
    ComputeDistance,
    GenerateHorizon,
    UpdateHorizon,
    GenerateGBur,
    ComputeNextState,
    UpdateCurrentState,
}

#[derive(Debug, Clone, Default)]
pub struct PlannerInfo {
    num_iterations: usize,
    /// Elapsed time since the start of the run, recorded at the end of each iteration
    iteration_times: Vec<Duration>,
    routine_times: BTreeMap<Routine, Vec<Duration>>,
    num_replans: usize,
    num_successful_replans: usize,
    success: bool,
    planning_time: Duration,
}

impl PlannerInfo {
    pub fn num_iterations(&self) -> usize {
        self.num_iterations
    }

    pub fn iteration_times(&self) -> &[Duration] {
        &self.iteration_times
    }

    pub fn record_iteration(&mut self, elapsed: Duration) {
        self.num_iterations += 1;
        self.iteration_times.push(elapsed);
    }

    pub fn add_routine_time(&mut self, routine: Routine, time: Duration) {
        self.routine_times.entry(routine).or_default().push(time);
    }

    pub fn routine_times(&self, routine: Routine) -> &[Duration] {
        self.routine_times.get(&routine).map_or(&[], Vec::as_slice)
    }

    pub fn mean_routine_time(&self, routine: Routine) -> Option<Duration> {
        let times = self.routine_times(routine);
        if times.is_empty() {
            return None;
        }
        Some(times.iter().sum::<Duration>() / times.len() as u32)
    }

    pub fn record_replan(&mut self, success: bool) {
        self.num_replans += 1;
        if success {
            self.num_successful_replans += 1;
        }
    }

    pub fn num_replans(&self) -> usize {
        self.num_replans
    }

    pub fn num_successful_replans(&self) -> usize {
        self.num_successful_replans
    }

    pub fn set_outcome(&mut self, success: bool, planning_time: Duration) {
        self.success = success;
        self.planning_time = planning_time;
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn planning_time(&self) -> Duration {
        self.planning_time
    }
}
