//! DRGBT: Dynamic Rapidly-exploring Generalized Bur Tree
//!
//! Reactive controller that moves an agent one bounded step per iteration
//! among moving obstacles. Each iteration it refreshes a horizon of
//! candidate next configurations, evaluates their reachability with a
//! generalized bur, picks the best one by weight, executes the motion and
//! decides whether a new global path is needed.
//!
//! The component stages live in their own modules as further `impl` blocks
//! on [`DrgbtPlanner`].

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::common::{
    Clearance, Configuration, ConfigurationSpace, MotionStatus, PlannerFactory, RealizedPath, RoboticsError,
    RoboticsResult,
};
use crate::dynamic_planning::config::DrgbtConfig;
use crate::dynamic_planning::horizon::Horizon;
use crate::dynamic_planning::horizon_state::HorizonState;
use crate::dynamic_planning::replanning::{PredefinedPath, ReplanScheduler};
use crate::dynamic_planning::telemetry::{PlannerInfo, Routine};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    GoalReached,
    Collision,
    PlanningTimeExceeded,
    IterationLimitReached,
}

impl Termination {
    pub fn is_success(&self) -> bool {
        *self == Termination::GoalReached
    }
}

pub struct DrgbtPlanner<S: ConfigurationSpace> {
    pub(crate) space: S,
    pub(crate) start: Configuration,
    pub(crate) goal: Configuration,
    pub(crate) config: DrgbtConfig,
    pub(crate) rng: StdRng,

    pub(crate) horizon: Horizon,
    pub(crate) horizon_size: usize,
    pub(crate) num_lateral_states: usize,
    /// Target chosen in the last iteration (a copy, identified by its handle)
    pub(crate) q_next: HorizonState,
    /// Running mean of the largest clearance in the horizon
    pub(crate) d_max_mean: f64,

    pub(crate) q_current: Configuration,
    pub(crate) q_previous: Configuration,
    /// Exact clearance of `q_current` with its nearest points
    pub(crate) clearance: Clearance,
    pub(crate) status: MotionStatus,

    pub(crate) predefined_path: PredefinedPath,
    pub(crate) scheduler: ReplanScheduler<S>,

    pub(crate) path: RealizedPath,
    pub(crate) planner_info: PlannerInfo,
    pub(crate) time_start: Instant,
    pub(crate) time_iter_start: Instant,
}

impl<S: ConfigurationSpace> DrgbtPlanner<S> {
    /// Create a planner that replans with the global planner named in `config`
    pub fn new(space: S, start: Configuration, goal: Configuration, config: DrgbtConfig) -> RoboticsResult<Self> {
        let factory = Box::new(config.static_planner.clone());
        Self::with_planner_factory(space, start, goal, config, factory)
    }

    /// Create a planner that replans with planners built by `factory`
    pub fn with_planner_factory(
        space: S,
        start: Configuration,
        goal: Configuration,
        config: DrgbtConfig,
        factory: Box<dyn PlannerFactory<S>>,
    ) -> RoboticsResult<Self> {
        config.validate()?;
        let dims = space.num_dimensions();
        if dims == 0 {
            return Err(RoboticsError::InvalidParameter("space must have at least one dimension".to_string()));
        }
        if start.dims() != dims || goal.dims() != dims {
            return Err(RoboticsError::InvalidParameter(format!(
                "start and goal must have {} coordinates",
                dims
            )));
        }
        if !space.is_valid(&start) {
            return Err(RoboticsError::InvalidStart(start.to_string()));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let num_lateral_states = 2 * dims - 2;
        let mut horizon = Horizon::new();
        let q_next = horizon.create_state(start.clone(), Some(0));
        let scheduler = ReplanScheduler::new(config.real_time_scheduling, factory, config.task2_time());
        let now = Instant::now();

        Ok(Self {
            horizon_size: config.init_horizon_size + num_lateral_states,
            num_lateral_states,
            horizon,
            q_next,
            d_max_mean: 0.0,
            q_current: start.clone(),
            q_previous: start.clone(),
            clearance: Clearance::unbounded(),
            status: MotionStatus::Reached,
            predefined_path: PredefinedPath::default(),
            scheduler,
            path: RealizedPath::new(start.clone()),
            planner_info: PlannerInfo::default(),
            time_start: now,
            time_iter_start: now,
            space,
            start,
            goal,
            config,
            rng,
        })
    }

    /// Drive the agent until the goal is reached or the run has to stop
    pub fn solve(&mut self) -> Termination {
        self.time_start = Instant::now();
        self.time_iter_start = self.time_start;
        info!(
            start = %self.start,
            goal = %self.goal,
            planner = %self.scheduler.planner_name(),
            scheduling = ?self.config.real_time_scheduling,
            "DRGBT run started"
        );

        if self.space.is_equal(&self.q_current, &self.goal) {
            return self.finish(Termination::GoalReached);
        }

        self.replan_initial();

        loop {
            self.time_iter_start = Instant::now();
            if self.space.is_equal(&self.q_current, &self.goal) {
                return self.finish(Termination::GoalReached);
            }
            if let Some(termination) = self.run_iteration() {
                return termination;
            }
        }
    }

    /// One control iteration; returns how the run ended if it did
    pub(crate) fn run_iteration(&mut self) -> Option<Termination> {
        let time = Instant::now();
        let is_valid = self.check_motion_validity();
        self.clearance = self.space.compute_distance(&self.q_current, true);
        self.planner_info.add_routine_time(Routine::ComputeDistance, time.elapsed());
        if !is_valid || self.clearance.distance <= 0.0 {
            warn!(q = %self.q_current, d_c = self.clearance.distance, "collision detected");
            return Some(self.finish(Termination::Collision));
        }

        if self.status != MotionStatus::Advanced {
            let time = Instant::now();
            self.generate_horizon();
            self.planner_info.add_routine_time(Routine::GenerateHorizon, time.elapsed());
        }

        let time = Instant::now();
        self.update_horizon(self.clearance.distance);
        self.planner_info.add_routine_time(Routine::UpdateHorizon, time.elapsed());

        let time = Instant::now();
        self.generate_gbur();
        self.planner_info.add_routine_time(Routine::GenerateGBur, time.elapsed());

        let time = Instant::now();
        self.compute_next_state();
        self.planner_info.add_routine_time(Routine::ComputeNextState, time.elapsed());

        let time = Instant::now();
        self.update_current_state();
        self.path.push(self.q_current.clone());
        self.planner_info.add_routine_time(Routine::UpdateCurrentState, time.elapsed());

        if self.scheduler.is_pending()
            || self.scheduler.whether_to_replan(&self.horizon, self.config.weight_min, self.config.weight_mean_min)
        {
            let remaining = self.config.max_iter_time().saturating_sub(self.time_iter_start.elapsed());
            self.replan(remaining);
        }

        self.planner_info.record_iteration(self.time_start.elapsed());
        debug!(
            iteration = self.planner_info.num_iterations(),
            q = %self.q_current,
            status = ?self.status,
            d_c = self.clearance.distance,
            horizon = self.horizon.len(),
            "iteration finished"
        );
        self.check_terminating_condition()
    }

    /// Goal, planning-time and iteration limits, in that order
    pub fn check_terminating_condition(&mut self) -> Option<Termination> {
        if self.space.is_equal(&self.q_current, &self.goal) {
            return Some(self.finish(Termination::GoalReached));
        }
        if self.time_start.elapsed() >= self.config.max_planning_time() {
            return Some(self.finish(Termination::PlanningTimeExceeded));
        }
        if self.planner_info.num_iterations() >= self.config.max_num_iter {
            return Some(self.finish(Termination::IterationLimitReached));
        }
        None
    }

    fn finish(&mut self, termination: Termination) -> Termination {
        self.scheduler.abandon();
        let planning_time = self.time_start.elapsed();
        self.planner_info.set_outcome(termination.is_success(), planning_time);
        info!(
            ?termination,
            iterations = self.planner_info.num_iterations(),
            replans = self.planner_info.num_replans(),
            planning_time_ms = planning_time.as_secs_f64() * 1e3,
            "DRGBT run finished"
        );
        termination
    }

    pub fn start(&self) -> &Configuration {
        &self.start
    }

    pub fn goal(&self) -> &Configuration {
        &self.goal
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    pub fn config(&self) -> &DrgbtConfig {
        &self.config
    }

    pub fn current_configuration(&self) -> &Configuration {
        &self.q_current
    }

    pub fn motion_status(&self) -> MotionStatus {
        self.status
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn next_state(&self) -> &HorizonState {
        &self.q_next
    }

    pub fn predefined_path(&self) -> &PredefinedPath {
        &self.predefined_path
    }

    pub fn is_replanning_required(&self) -> bool {
        self.scheduler.is_replanning_required()
    }

    /// Configurations actually executed, starting with the start configuration
    pub fn realized_path(&self) -> &RealizedPath {
        &self.path
    }

    pub fn planner_info(&self) -> &PlannerInfo {
        &self.planner_info
    }

    /// Time since `solve` started
    pub fn elapsed(&self) -> Duration {
        self.time_start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic_planning::config::RealTimeScheduling;
    use crate::dynamic_planning::test_support::*;
    use crate::environment::{AreaBounds, MovingObstacleSpace, ScenarioConfig, SphereObstacle};

    #[test]
    fn test_invalid_start_is_rejected() {
        let bounds = AreaBounds::cube(2, -2.0, 2.0).unwrap();
        let obstacles = vec![SphereObstacle::fixed(vec![0.0, 0.0], 0.5)];
        let space = MovingObstacleSpace::new(bounds, obstacles, 0.1, 0.02).unwrap();
        let goal = Configuration::new(vec![1.5, 1.5]);
        let result = DrgbtPlanner::new(space, Configuration::zeros(2), goal, DrgbtConfig::default());
        assert!(matches!(result, Err(RoboticsError::InvalidStart(_))));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let result =
            DrgbtPlanner::new(open_space(2), Configuration::zeros(3), Configuration::zeros(2), DrgbtConfig::default());
        assert!(matches!(result, Err(RoboticsError::InvalidParameter(_))));
    }

    #[test]
    fn test_start_equals_goal() {
        let mut planner = planner_in(open_space(2), vec![1.0, 1.0], vec![1.0, 1.0], DrgbtConfig::default());

        assert_eq!(planner.solve(), Termination::GoalReached);
        assert_eq!(planner.realized_path().len(), 1);
        assert_eq!(planner.planner_info().num_iterations(), 0);
        assert!(planner.planner_info().success());
    }

    #[test]
    fn test_obstacle_free_run_follows_straight_line() {
        let config = DrgbtConfig { seed: Some(7), ..Default::default() };
        let mut planner = DrgbtPlanner::with_planner_factory(
            open_space(2),
            Configuration::new(vec![0.0, 0.0]),
            Configuration::new(vec![1.05, 0.0]),
            config,
            Box::new(StubFactory::solving(Duration::ZERO)),
        )
        .unwrap();

        assert_eq!(planner.solve(), Termination::GoalReached);

        let info = planner.planner_info();
        assert_eq!(info.num_iterations(), 11);
        assert_eq!(info.num_successful_replans(), 1);
        assert_eq!(planner.realized_path().len(), info.num_iterations() + 1);
        assert!(planner.space.is_equal(planner.realized_path().last().unwrap(), &planner.goal));
        for q in planner.realized_path().configurations() {
            assert!(q.coord()[1].abs() < 1e-9);
        }
        for (a, b) in planner.realized_path().configurations().zip(planner.realized_path().configurations().skip(1)) {
            assert!(a.distance(b) <= planner.config.step + 1e-9);
        }
    }

    #[test]
    fn test_replanning_stays_required_while_searches_fail() {
        let mut planner = stub_planner(StubFactory::failing(), DrgbtConfig::default());
        planner.replan_initial();
        assert!(planner.scheduler.is_replanning_required());

        for iteration in 1..=2 {
            planner.time_iter_start = Instant::now();
            assert_eq!(planner.run_iteration(), None);
            assert!(planner.scheduler.is_replanning_required(), "iteration {}", iteration);
            assert!(planner.predefined_path.is_empty());
        }
        assert_eq!(planner.planner_info().num_iterations(), 2);
        assert_eq!(planner.planner_info().num_successful_replans(), 0);
    }

    #[test]
    fn test_iteration_limit() {
        let config = DrgbtConfig { max_num_iter: 3, seed: Some(1), ..Default::default() };
        let mut planner = planner_in(open_space(2), vec![0.0, 0.0], vec![5.0, 5.0], config);

        assert_eq!(planner.solve(), Termination::IterationLimitReached);
        assert_eq!(planner.planner_info().num_iterations(), 3);
        assert!(!planner.planner_info().success());
    }

    #[test]
    fn test_collision_with_obstacle_moving_into_agent() {
        let bounds = AreaBounds::cube(2, -5.0, 5.0).unwrap();
        let obstacle = SphereObstacle::new(vec![0.0, 3.0], 0.5, vec![0.0, -40.0]);
        let space = MovingObstacleSpace::new(bounds, vec![obstacle], 0.1, 0.02).unwrap();
        let config = DrgbtConfig { seed: Some(2), max_num_iter: 20, ..Default::default() };
        let mut planner = planner_in(space, vec![0.0, 0.0], vec![4.0, -4.0], config);

        assert_eq!(planner.solve(), Termination::Collision);
        assert!(!planner.planner_info().success());
    }

    #[test]
    fn test_planar_crossing_scenario() {
        let (space, start, goal) = ScenarioConfig::planar_crossing().build().unwrap();
        let config = DrgbtConfig {
            seed: Some(42),
            max_num_iter: 200,
            max_planning_time_ms: 60_000.0,
            real_time_scheduling: RealTimeScheduling::Unscheduled,
            ..Default::default()
        };
        let mut planner = DrgbtPlanner::new(space, start, goal, config).unwrap();

        let termination = planner.solve();

        // Every executed step is bounded and collision free up to the last one
        let path = planner.realized_path();
        assert_eq!(path.len(), planner.planner_info().num_iterations() + 1);
        for (a, b) in path.configurations().zip(path.configurations().skip(1)) {
            assert!(a.distance(b) <= planner.config.step + 1e-9);
        }
        if termination == Termination::GoalReached {
            assert!(planner.space.is_equal(path.last().unwrap(), &planner.goal));
        }
    }
}
