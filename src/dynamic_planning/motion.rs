//! Motion execution and validation of the executed motion

use tracing::{debug, trace};

use crate::common::{ConfigurationSpace, MotionStatus};
use crate::dynamic_planning::drgbt::DrgbtPlanner;

impl<S: ConfigurationSpace> DrgbtPlanner<S> {
    /// Move at most one step towards the spine of the next target.
    ///
    /// Making no progress marks the agent as trapped and flushes the horizon.
    pub(crate) fn update_current_state(&mut self) {
        self.q_previous = self.q_current.clone();
        let q_new = self.space.interpolate_edge(&self.q_current, self.q_next.reached(), self.config.step);

        if self.space.is_equal(&q_new, &self.q_current) {
            self.status = MotionStatus::Trapped;
            self.scheduler.require_replanning();
            self.horizon.clear();
            debug!(q = %self.q_current, "agent trapped");
        } else {
            // Arriving at the end of a blocked spine is only progress
            self.status = if self.q_next.is_reached() && self.space.is_equal(&q_new, self.q_next.reached()) {
                MotionStatus::Reached
            } else {
                MotionStatus::Advanced
            };
            self.q_current = q_new;
        }
        trace!(status = ?self.status, q = %self.q_current, "motion executed");
    }

    /// Check the last executed motion against the moving environment.
    ///
    /// The environment is advanced by an equal share of the iteration period
    /// before each of the intermediate configurations is checked.
    pub(crate) fn check_motion_validity(&mut self) -> bool {
        let num_checks = self.config.max_num_validity_checks;
        let delta_time = self.config.max_iter_time().as_secs_f64() / num_checks as f64;

        for k in 1..=num_checks {
            self.space.advance_environment(delta_time);
            let q = self.q_previous.lerp(&self.q_current, k as f64 / num_checks as f64);
            if !self.space.is_valid(&q) {
                debug!(q = %q, "collision along the executed motion");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Configuration, ConfigurationSpace};
    use crate::dynamic_planning::test_support::*;
    use crate::environment::{AreaBounds, MovingObstacleSpace, SphereObstacle};

    fn target(planner: &mut DrgbtPlanner<MovingObstacleSpace>, coord: Vec<f64>) {
        let q = Configuration::new(coord);
        let mut state = planner.horizon.create_state(q.clone(), Some(1));
        state.set_reached(q, true);
        planner.q_next = state;
    }

    #[test]
    fn test_advance_towards_far_target() {
        let mut planner = open_planner(2, DrgbtConfig::default());
        target(&mut planner, vec![1.0, 0.0]);

        planner.update_current_state();

        assert_eq!(planner.status, MotionStatus::Advanced);
        assert!((planner.q_current.coord()[0] - planner.config.step).abs() < 1e-12);
        assert_eq!(planner.q_previous, Configuration::zeros(2));
    }

    #[test]
    fn test_reach_close_target() {
        let mut planner = open_planner(2, DrgbtConfig::default());
        target(&mut planner, vec![0.05, 0.0]);

        planner.update_current_state();

        assert_eq!(planner.status, MotionStatus::Reached);
        assert_eq!(planner.q_current, Configuration::new(vec![0.05, 0.0]));
    }

    #[test]
    fn test_end_of_blocked_spine_is_not_reached() {
        let mut planner = open_planner(2, DrgbtConfig::default());
        let mut state = planner.horizon.create_state(Configuration::new(vec![1.0, 0.0]), Some(1));
        state.set_reached(Configuration::new(vec![0.05, 0.0]), false);
        planner.q_next = state;

        planner.update_current_state();

        assert_eq!(planner.status, MotionStatus::Advanced);
        assert_eq!(planner.q_current, Configuration::new(vec![0.05, 0.0]));
        assert!(!planner.scheduler.is_replanning_required());
    }

    #[test]
    fn test_no_progress_traps_agent() {
        let mut planner = open_planner(2, DrgbtConfig::default());
        planner.add_random_states(4);
        target(&mut planner, vec![0.0, 0.0]);

        planner.update_current_state();

        assert_eq!(planner.status, MotionStatus::Trapped);
        assert!(planner.horizon.is_empty());
        assert!(planner.scheduler.is_replanning_required());
    }

    #[test]
    fn test_motion_validity_with_moving_obstacle() {
        let bounds = AreaBounds::cube(2, -5.0, 5.0).unwrap();
        // Crosses the agent's position within one iteration period
        let obstacle = SphereObstacle::new(vec![0.0, 1.0], 0.3, vec![0.0, -20.0]);
        let space = MovingObstacleSpace::new(bounds, vec![obstacle], 0.05, 0.02).unwrap();
        let config = DrgbtConfig { max_iter_time_ms: 100.0, ..Default::default() };
        let mut planner = planner_in(space, vec![0.0, -1.0], vec![4.0, 4.0], config);
        planner.q_previous = Configuration::new(vec![0.0, 0.0]);
        planner.q_current = Configuration::new(vec![0.1, 0.0]);

        assert!(!planner.check_motion_validity());
    }

    #[test]
    fn test_motion_validity_advances_environment() {
        let bounds = AreaBounds::cube(2, -5.0, 5.0).unwrap();
        let obstacle = SphereObstacle::new(vec![3.0, 3.0], 0.3, vec![1.0, 0.0]);
        let space = MovingObstacleSpace::new(bounds, vec![obstacle], 0.05, 0.02).unwrap();
        let mut planner = planner_in(space, vec![0.0, 0.0], vec![4.0, -4.0], DrgbtConfig::default());
        planner.q_current = Configuration::new(vec![0.1, 0.0]);

        assert!(planner.check_motion_validity());
        assert!((planner.space.time() - planner.config.max_iter_time().as_secs_f64()).abs() < 1e-9);
        assert!(planner.space.is_valid(&planner.q_current));
    }
}
