//! Horizon: the bounded working set of candidate next configurations
//!
//! The horizon is refilled from the predefined path when the previous
//! target was reached, from random samples when the agent is trapped or no
//! path is known, and is resized every iteration as an inverse function of
//! the clearance of the current configuration.

use nalgebra::DVector;
use ordered_float::OrderedFloat;
use tracing::{debug, trace};

use crate::common::{Configuration, ConfigurationSpace, MotionStatus};
use crate::dynamic_planning::drgbt::DrgbtPlanner;
use crate::dynamic_planning::horizon_state::{HorizonId, HorizonState, HorizonStatus};

/// Heading components below this are treated as zero
const LATERAL_TOLERANCE: f64 = 1e-3;

/// Ordered collection of horizon states
#[derive(Debug, Clone, Default)]
pub struct Horizon {
    states: Vec<HorizonState>,
    next_id: u64,
}

impl Horizon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state with a fresh handle without inserting it
    pub fn create_state(&mut self, configuration: Configuration, path_index: Option<usize>) -> HorizonState {
        let id = HorizonId(self.next_id);
        self.next_id += 1;
        HorizonState::new(id, configuration, path_index)
    }

    pub fn push_new(&mut self, configuration: Configuration, path_index: Option<usize>) -> HorizonId {
        let state = self.create_state(configuration, path_index);
        let id = state.id();
        self.states.push(state);
        id
    }

    pub fn push(&mut self, state: HorizonState) {
        self.states.push(state);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[HorizonState] {
        &self.states
    }

    pub fn iter(&self) -> impl Iterator<Item = &HorizonState> {
        self.states.iter()
    }

    pub fn get(&self, index: usize) -> Option<&HorizonState> {
        self.states.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut HorizonState> {
        self.states.get_mut(index)
    }

    pub fn front(&self) -> Option<&HorizonState> {
        self.states.first()
    }

    /// Position of the state with handle `id`, if it is still in the horizon
    pub fn position(&self, id: HorizonId) -> Option<usize> {
        self.states.iter().position(|q| q.id() == id)
    }

    pub fn contains(&self, id: HorizonId) -> bool {
        self.position(id).is_some()
    }

    /// Put `state` into slot `index`, dropping the previous occupant
    pub fn replace(&mut self, index: usize, state: HorizonState) {
        self.states[index] = state;
    }

    pub fn remove(&mut self, index: usize) -> HorizonState {
        self.states.remove(index)
    }

    pub fn retain<F: FnMut(&HorizonState) -> bool>(&mut self, f: F) {
        self.states.retain(f);
    }

    pub fn truncate(&mut self, len: usize) {
        self.states.truncate(len);
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Highest path index among on-path states
    pub fn last_path_index(&self) -> Option<usize> {
        self.states.iter().filter_map(HorizonState::path_index).max()
    }

    pub fn max_weight(&self) -> f64 {
        self.states
            .iter()
            .map(|q| OrderedFloat(q.weight()))
            .max()
            .map_or(0.0, |w| w.into_inner())
    }

    pub fn mean_weight(&self) -> f64 {
        if self.states.is_empty() {
            return 0.0;
        }
        self.states.iter().map(HorizonState::weight).sum::<f64>() / self.states.len() as f64
    }

    /// Remove `num` states: bad states first, then off-path states, then from the back
    pub fn shorten(&mut self, num: usize) {
        let mut num_deleted = 0;
        let stages: [fn(&HorizonState) -> bool; 3] = [
            |q| q.status() == HorizonStatus::Bad,
            |q| !q.is_on_path(),
            |_| true,
        ];
        for should_delete in stages {
            let mut i = self.states.len();
            while i > 0 && num_deleted < num {
                i -= 1;
                if should_delete(&self.states[i]) {
                    self.states.remove(i);
                    num_deleted += 1;
                }
            }
            if num_deleted == num {
                return;
            }
        }
    }
}

impl std::ops::Index<usize> for Horizon {
    type Output = HorizonState;

    fn index(&self, index: usize) -> &HorizonState {
        &self.states[index]
    }
}

impl<S: ConfigurationSpace> DrgbtPlanner<S> {
    /// Largest horizon the current dimensionality allows
    pub fn max_horizon_size(&self) -> usize {
        self.space.num_dimensions() * self.config.init_horizon_size
    }

    /// Horizon size demanded by clearance `d_c`.
    ///
    /// Grows continuously as `d_c` shrinks towards `d_crit` and saturates at
    /// the dimension-scaled maximum; never smaller than the lateral quota.
    pub fn horizon_size_for(&self, d_c: f64) -> usize {
        let max_size = self.max_horizon_size();
        let size = if d_c > 0.0 {
            let ratio = 1.0 + self.config.d_crit / d_c;
            ((self.config.init_horizon_size as f64 * ratio).floor() as usize).min(max_size)
        } else {
            max_size
        };
        size.max(self.num_lateral_states)
    }

    /// Refill the horizon after the previous target was reached or the agent got trapped
    pub(crate) fn generate_horizon(&mut self) {
        let next_index = self.q_next.path_index();

        // Only on-path states ahead of the reached target survive
        self.horizon.retain(|q| match (q.path_index(), next_index) {
            (Some(i), Some(n)) => i > n,
            (Some(_), None) => true,
            (None, _) => false,
        });

        let capacity = self.horizon_size.saturating_sub(self.num_lateral_states);
        if self.status == MotionStatus::Reached && !self.predefined_path.is_empty() {
            let num_states = capacity.saturating_sub(self.horizon.len());
            let idx = self
                .horizon
                .last_path_index()
                .or(next_index)
                .map_or(0, |i| i + 1);
            let path_len = self.predefined_path.len();
            let end = (idx + num_states).min(path_len);

            for i in idx..end {
                let q = self.predefined_path[i].clone();
                self.horizon.push_new(q, Some(i));
            }
            if idx < path_len && idx + num_states > path_len {
                if let Some(last) = self.horizon.get_mut(self.horizon.len() - 1) {
                    last.mark_goal();
                }
                self.scheduler.clear_replanning();
            }
            trace!(from = idx, to = end, "horizon filled from predefined path");
        } else {
            self.horizon.clear();
            self.scheduler.require_replanning();
            self.add_random_states(capacity);
            debug!(status = ?self.status, "horizon regenerated from random states");
        }
    }

    /// Resize the horizon for clearance `d_c` and append lateral states
    pub(crate) fn update_horizon(&mut self, d_c: f64) {
        let size = self.horizon_size_for(d_c);
        let capacity = size - self.num_lateral_states;

        if self.horizon.len() > capacity {
            self.horizon.shorten(self.horizon.len() - capacity);
        } else if self.horizon.len() < capacity {
            self.add_random_states(capacity - self.horizon.len());
        }

        self.add_lateral_states();
        self.horizon_size = self.horizon.len();
        trace!(d_c, size = self.horizon_size, "horizon updated");
    }

    pub(crate) fn add_random_states(&mut self, num: usize) {
        for _ in 0..num {
            let q_rand = self.space.random_state(&mut self.rng, &self.q_current);
            self.horizon.push_new(q_rand, None);
        }
    }

    /// Append states roughly orthogonal to the heading towards the target.
    ///
    /// In 2D the two perpendicular directions are used; in higher dimensions
    /// a random sample is projected onto the hyperplane orthogonal to the
    /// heading. Whatever cannot be constructed is filled with random states.
    pub(crate) fn add_lateral_states(&mut self) {
        let dims = self.space.num_dimensions();
        let heading = self.lateral_heading();
        let norm = heading.norm();
        let mut num_added = 0;

        if dims == 2 && norm > LATERAL_TOLERANCE {
            let perpendicular = DVector::from_vec(vec![-heading[1], heading[0]]) / norm;
            for sign in [-1.0, 1.0] {
                let q_new = Configuration::from_vector(self.q_current.coord() + &perpendicular * sign);
                if self.push_lateral(q_new) {
                    num_added += 1;
                }
            }
        } else if dims > 2 {
            if let Some(idx) = (0..dims).find(|&k| heading[k].abs() > LATERAL_TOLERANCE) {
                for _ in 0..self.num_lateral_states {
                    let q_rand = self.space.random_state(&mut self.rng, &self.q_current);
                    let mut offset = q_rand.coord() - self.q_current.coord();
                    let rest = offset.dot(&heading) - offset[idx] * heading[idx];
                    offset[idx] = -rest / heading[idx];
                    let q_new = Configuration::from_vector(self.q_current.coord() + offset);
                    if self.push_lateral(q_new) {
                        num_added += 1;
                    }
                }
            }
        }

        let num_lateral = self.num_lateral_states;
        self.add_random_states(num_lateral.saturating_sub(num_added));
    }

    fn lateral_heading(&self) -> DVector<f64> {
        let target = if self.space.is_equal(self.q_next.configuration(), &self.q_current) {
            self.horizon.front().map_or(self.q_next.configuration(), HorizonState::configuration)
        } else {
            self.q_next.configuration()
        };
        target.coord() - self.q_current.coord()
    }

    fn push_lateral(&mut self, q_new: Configuration) -> bool {
        let q_new = self.space.interpolate_edge(&self.q_current, &q_new, self.config.lateral_delta);
        let q_new = self.space.prune_edge(&self.q_current, &q_new);
        if self.space.is_equal(&self.q_current, &q_new) {
            return false;
        }
        self.horizon.push_new(q_new, None);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic_planning::replanning::PredefinedPath;
    use crate::dynamic_planning::test_support::*;
    use proptest::prelude::*;

    fn straight_path(len: usize) -> PredefinedPath {
        let points: Vec<_> = (0..len).map(|i| Configuration::new(vec![i as f64 * 0.1, 0.0])).collect();
        PredefinedPath::densify(&points, 0.2)
    }

    #[test]
    fn test_shorten_priority() {
        let mut horizon = Horizon::new();
        horizon.push_new(Configuration::new(vec![0.0]), Some(1));
        horizon.push_new(Configuration::new(vec![1.0]), None);
        let bad = horizon.create_state(Configuration::new(vec![2.0]), Some(2));
        horizon.push(bad.with_measurements(0.1, 0.3, HorizonStatus::Bad));
        horizon.push_new(Configuration::new(vec![3.0]), Some(3));

        horizon.shorten(2);
        let remaining: Vec<_> = horizon.iter().map(|q| q.path_index()).collect();
        assert_eq!(remaining, vec![Some(1), Some(3)]);

        horizon.shorten(1);
        assert_eq!(horizon.len(), 1);
        assert_eq!(horizon[0].path_index(), Some(1));
    }

    #[test]
    fn test_generate_horizon_from_predefined_path() {
        let mut planner = open_planner(2, DrgbtConfig::default());
        planner.predefined_path = straight_path(30);
        planner.status = MotionStatus::Reached;

        planner.generate_horizon();

        let capacity = planner.horizon_size - planner.num_lateral_states;
        assert_eq!(planner.horizon.len(), capacity);
        let indices: Vec<_> = planner.horizon.iter().filter_map(|q| q.path_index()).collect();
        assert_eq!(indices, (1..=capacity).collect::<Vec<_>>());
        assert!(planner.horizon.iter().all(|q| q.status() == HorizonStatus::Normal));
    }

    #[test]
    fn test_generate_horizon_discards_passed_states() {
        let mut planner = open_planner(2, DrgbtConfig::default());
        planner.predefined_path = straight_path(30);
        planner.status = MotionStatus::Reached;
        planner.generate_horizon();

        planner.q_next = planner.horizon[2].clone();
        planner.horizon.push_new(Configuration::new(vec![5.0, 5.0]), None);
        planner.generate_horizon();

        assert!(planner.horizon.iter().all(|q| q.path_index().map_or(false, |i| i > 3)));
        assert_eq!(planner.horizon[0].path_index(), Some(4));
    }

    #[test]
    fn test_generate_horizon_marks_goal_when_path_exhausted() {
        let mut planner = open_planner(2, DrgbtConfig::default());
        planner.predefined_path = straight_path(4);
        planner.status = MotionStatus::Reached;
        planner.scheduler.require_replanning();

        planner.generate_horizon();

        assert_eq!(planner.horizon.len(), 3);
        assert_eq!(planner.horizon[2].status(), HorizonStatus::Goal);
        assert!(!planner.scheduler.is_replanning_required());
    }

    #[test]
    fn test_generate_horizon_when_trapped() {
        let mut planner = open_planner(2, DrgbtConfig::default());
        planner.predefined_path = straight_path(30);
        planner.status = MotionStatus::Trapped;

        planner.generate_horizon();

        assert!(planner.scheduler.is_replanning_required());
        assert_eq!(planner.horizon.len(), planner.horizon_size - planner.num_lateral_states);
        assert!(planner.horizon.iter().all(|q| !q.is_on_path()));
    }

    #[test]
    fn test_horizon_size_grows_as_clearance_shrinks() {
        let planner = open_planner(3, DrgbtConfig::default());
        let far = planner.horizon_size_for(10.0);
        let near = planner.horizon_size_for(0.05);
        let touching = planner.horizon_size_for(0.0);

        assert_eq!(far, 10);
        assert_eq!(near, 20);
        assert_eq!(touching, planner.max_horizon_size());
        assert!(far <= near && near <= touching);
    }

    #[test]
    fn test_update_horizon_is_idempotent() {
        let mut planner = open_planner(2, DrgbtConfig::default());
        planner.update_horizon(0.1);
        let size = planner.horizon.len();
        planner.update_horizon(0.1);
        assert_eq!(planner.horizon.len(), size);
        assert_eq!(size, planner.horizon_size_for(0.1));
    }

    #[test]
    fn test_lateral_states_are_orthogonal_in_plane() {
        let mut planner = open_planner(2, DrgbtConfig::default());
        planner.q_next = planner.horizon.create_state(Configuration::new(vec![1.0, 0.0]), Some(1));

        planner.add_lateral_states();

        assert_eq!(planner.horizon.len(), 2);
        for q in planner.horizon.iter() {
            assert!(q.configuration().coord()[0].abs() < 1e-9);
            assert!((q.configuration().coord()[1].abs() - planner.config.lateral_delta).abs() < 1e-9);
        }
    }

    #[test]
    fn test_lateral_states_fall_back_to_random() {
        let mut planner = open_planner(3, DrgbtConfig::default());
        // Heading is degenerate: the target coincides with the current configuration
        planner.add_lateral_states();
        assert_eq!(planner.horizon.len(), planner.num_lateral_states);
    }

    #[test]
    fn test_lateral_states_in_higher_dimensions() {
        let mut planner = open_planner(4, DrgbtConfig::default());
        planner.q_next = planner.horizon.create_state(Configuration::new(vec![1.0, 1.0, 0.0, 0.0]), Some(1));
        let heading = planner.q_next.configuration().coord().clone();

        planner.add_lateral_states();

        assert_eq!(planner.horizon.len(), planner.num_lateral_states);
        let orthogonal = planner
            .horizon
            .iter()
            .filter(|q| (q.configuration().coord() - planner.q_current.coord()).dot(&heading).abs() < 1e-9)
            .count();
        assert!(orthogonal > 0);
    }

    proptest! {
        #[test]
        fn prop_horizon_never_exceeds_maximum(
            dims in 1usize..6,
            clearances in proptest::collection::vec(0.0f64..5.0, 1..8)
        ) {
            let mut planner = open_planner(dims, DrgbtConfig::default());
            for d_c in clearances {
                planner.update_horizon(d_c);
                prop_assert!(planner.horizon.len() <= planner.max_horizon_size());
            }
        }
    }
}
