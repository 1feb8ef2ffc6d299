//! Generalized bur: reachability of every horizon state from the current configuration
//!
//! Each horizon state gets a spine ending in the furthest collision-free
//! configuration on the segment towards it. Bad and critical states are repaired by
//! perturbing their spine while the local-tracking slice of the iteration
//! still has time left.

use nalgebra::DVector;
use rand_distr::{Distribution, Uniform};
use rand::Rng;
use tracing::{debug, trace};

use crate::common::{Configuration, ConfigurationSpace, NearestPoint};
use crate::dynamic_planning::config::RealTimeScheduling;
use crate::dynamic_planning::drgbt::DrgbtPlanner;
use crate::dynamic_planning::horizon_state::{HorizonState, HorizonStatus};

/// Compute the reached configuration of `q` and refresh its clearance and status
pub(crate) fn compute_reached_state<S: ConfigurationSpace>(
    space: &S,
    q_current: &Configuration,
    nearest_points: &[NearestPoint],
    goal: &Configuration,
    d_crit: f64,
    q: &mut HorizonState,
) {
    let q_reached = space.prune_edge(q_current, q.configuration());
    let is_reached = space.is_equal(&q_reached, q.configuration());

    let d_c = space.compute_distance_underestimate(&q_reached, nearest_points);
    q.set_reached(q_reached, is_reached);
    q.record_distance(d_c, d_crit);

    if space.is_equal(q.reached(), goal) {
        q.mark_goal();
    }
}

/// Random vector of length `norm` with a random sign on its first component
fn random_perturbation<R: Rng + ?Sized>(rng: &mut R, dims: usize, norm: f64) -> DVector<f64> {
    let sign = |rng: &mut R| if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    if dims == 1 {
        return DVector::from_element(1, sign(rng) * norm);
    }

    let uniform = Uniform::new_inclusive(-1.0, 1.0);
    let scale = norm / ((dims - 1) as f64).sqrt();
    let mut vec = DVector::from_fn(dims, |_, _| uniform.sample(rng) * scale);
    let tail = vec.rows(1, dims - 1).norm_squared();
    vec[0] = sign(rng) * (norm * norm - tail).max(0.0).sqrt();
    vec
}

impl<S: ConfigurationSpace> DrgbtPlanner<S> {
    /// Evaluate every horizon state and try to repair the bad and critical ones.
    ///
    /// Under real-time scheduling the horizon is cut right after the state
    /// being processed when the local-tracking slice runs out.
    pub(crate) fn generate_gbur(&mut self) {
        let scheduled = self.config.real_time_scheduling != RealTimeScheduling::Unscheduled;
        let task1_time = self.config.task1_time();

        let mut idx = 0;
        while idx < self.horizon.len() {
            if let Some(q) = self.horizon.get_mut(idx) {
                compute_reached_state(
                    &self.space,
                    &self.q_current,
                    &self.clearance.nearest_points,
                    &self.goal,
                    self.config.d_crit,
                    q,
                );
            }

            if matches!(self.horizon[idx].status(), HorizonStatus::Bad | HorizonStatus::Critical) {
                let attempts = self.repair_attempts();
                if let Some(replacement) = self.modify_state(idx, attempts) {
                    trace!(idx, "horizon state repaired: {}", replacement);
                    self.horizon.replace(idx, replacement);
                }
            }

            if scheduled && self.time_iter_start.elapsed() > task1_time {
                let num_dropped = self.horizon.len() - idx - 1;
                if num_dropped > 0 {
                    debug!(num_dropped, "local tracking slice exhausted, horizon truncated");
                }
                self.horizon.truncate(idx + 1);
                break;
            }
            idx += 1;
        }
        self.horizon_size = self.horizon.len();
    }

    /// Repair attempts proportional to the share of the local-tracking slice left
    fn repair_attempts(&self) -> usize {
        let max_attempts = self.config.max_repair_attempts;
        if self.config.real_time_scheduling == RealTimeScheduling::Unscheduled {
            return max_attempts;
        }

        let task1_time = self.config.task1_time();
        let remaining = task1_time.saturating_sub(self.time_iter_start.elapsed());
        if task1_time.is_zero() {
            return 0;
        }
        (max_attempts as f64 * remaining.as_secs_f64() / task1_time.as_secs_f64()).ceil() as usize
    }

    /// Try to find a replacement for the bad or critical state at `idx`.
    ///
    /// Returns the first candidate whose clearance is strictly larger than
    /// the state being repaired. Candidates are fresh off-path states.
    pub(crate) fn modify_state(&mut self, idx: usize, attempts: usize) -> Option<HorizonState> {
        let (q_reached, status, distance) = {
            let q = &self.horizon[idx];
            (q.reached().coord().clone(), q.status(), q.distance())
        };
        let current = self.q_current.coord().clone();
        let dims = self.space.num_dimensions();
        let norm = (&q_reached - &current).norm();

        let mut coeff = 0.0;
        for _ in 0..attempts {
            let vec = random_perturbation(&mut self.rng, dims, norm);
            let q_new = match status {
                HorizonStatus::Bad => &q_reached + vec,
                HorizonStatus::Critical => {
                    // Reflect the spine through the current configuration
                    let reflected = &current * 2.0 - &q_reached + vec * coeff;
                    coeff = 1.0;
                    reflected
                }
                _ => return None,
            };

            let q_new = Configuration::from_vector(q_new);
            let q_new = self.space.interpolate_edge(&self.q_current, &q_new, self.config.lateral_delta);
            let q_new = self.space.prune_edge(&self.q_current, &q_new);
            if self.space.is_equal(&self.q_current, &q_new) {
                continue;
            }

            let mut candidate = self.horizon.create_state(q_new, None);
            compute_reached_state(
                &self.space,
                &self.q_current,
                &self.clearance.nearest_points,
                &self.goal,
                self.config.d_crit,
                &mut candidate,
            );
            if candidate.distance() > distance {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic_planning::test_support::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_perturbation_norm() {
        let mut rng = StdRng::seed_from_u64(3);
        for dims in 1..6 {
            let vec = random_perturbation(&mut rng, dims, 0.7);
            assert_eq!(vec.len(), dims);
            assert!((vec.norm() - 0.7).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reached_state_blocked_by_obstacle() {
        let space = wall_space();
        let q_current = Configuration::new(vec![-1.0, 0.0]);
        let clearance = space.compute_distance(&q_current, true);
        let goal = Configuration::new(vec![3.0, 0.0]);
        let mut q = HorizonState::new(
            crate::dynamic_planning::horizon_state::HorizonId(0),
            Configuration::new(vec![1.0, 0.0]),
            Some(1),
        );

        compute_reached_state(&space, &q_current, &clearance.nearest_points, &goal, 0.05, &mut q);

        assert!(!q.is_reached());
        assert!(q.reached().coord()[0] < -0.4);
        assert!(space.is_valid(q.reached()));
        assert_eq!(q.status(), HorizonStatus::Critical);
    }

    #[test]
    fn test_reached_state_marks_goal() {
        let space = open_space(2);
        let q_current = Configuration::new(vec![0.0, 0.0]);
        let goal = Configuration::new(vec![0.5, 0.5]);
        let mut q = HorizonState::new(crate::dynamic_planning::horizon_state::HorizonId(0), goal.clone(), None);

        compute_reached_state(&space, &q_current, &[], &goal, 0.05, &mut q);

        assert!(q.is_reached());
        assert_eq!(q.status(), HorizonStatus::Goal);
    }

    #[test]
    fn test_gbur_without_scheduling_keeps_horizon() {
        let config = DrgbtConfig { real_time_scheduling: RealTimeScheduling::Unscheduled, ..Default::default() };
        let mut planner = open_planner(2, config);
        planner.add_random_states(8);

        planner.generate_gbur();

        assert_eq!(planner.horizon.len(), 8);
        assert!(planner.horizon.iter().all(|q| q.is_reached()));
    }

    #[test]
    fn test_gbur_cutoff_truncates_horizon() {
        let config = DrgbtConfig { max_iter_time_ms: 1.0, ..Default::default() };
        let mut planner = open_planner(2, config);
        planner.add_random_states(8);
        std::thread::sleep(std::time::Duration::from_millis(5));

        planner.generate_gbur();

        // Slice already exhausted: only the first state is evaluated
        assert_eq!(planner.horizon.len(), 1);
        assert_eq!(planner.horizon_size, 1);
    }

    #[test]
    fn test_modify_critical_state_moves_away() {
        let config = DrgbtConfig { real_time_scheduling: RealTimeScheduling::Unscheduled, ..Default::default() };
        let mut planner = wall_planner(config);
        planner.horizon.push_new(Configuration::new(vec![1.0, 0.0]), Some(1));

        planner.generate_gbur();

        // The first attempt reflects the spine straight away from the wall
        let q = &planner.horizon[0];
        assert!(!q.is_on_path());
        assert!(q.configuration().coord()[0] < planner.q_current.coord()[0]);
        assert!(q.distance() > 0.05);
    }
}
