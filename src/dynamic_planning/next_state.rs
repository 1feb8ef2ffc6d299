//! Next-state selection by horizon weights
//!
//! Every horizon state is weighted by its clearance relative to a running
//! mean of the best clearances, by how its clearance changed since the last
//! evaluation, and by how much closer its spine gets to the goal compared to
//! the other states.

use tracing::{debug, trace};

use crate::common::ConfigurationSpace;
use crate::dynamic_planning::drgbt::DrgbtPlanner;
use crate::dynamic_planning::horizon_state::HorizonStatus;

const EPSILON: f64 = 1e-6;

impl<S: ConfigurationSpace> DrgbtPlanner<S> {
    /// Weigh the horizon and pick the next target
    pub(crate) fn compute_next_state(&mut self) {
        let eligible: Vec<usize> = (0..self.horizon.len())
            .filter(|&i| self.horizon[i].status() != HorizonStatus::Critical)
            .collect();
        if eligible.is_empty() {
            // Nowhere to go: stay put, the executor reports the agent as trapped
            let mut q_stay = self.horizon.create_state(self.q_current.clone(), None);
            q_stay.set_reached(self.q_current.clone(), true);
            self.q_next = q_stay;
            debug!("no admissible horizon state, holding position");
            return;
        }

        let dist_to_goal: Vec<f64> = self
            .horizon
            .iter()
            .map(|q| self.space.norm(q.reached(), &self.goal).max(EPSILON))
            .collect();
        let d_goal_min = dist_to_goal.iter().copied().fold(f64::INFINITY, f64::min);
        let weights_dist: Vec<f64> = dist_to_goal.iter().map(|d| d_goal_min / d).collect();
        let weights_dist_mean = weights_dist.iter().sum::<f64>() / weights_dist.len() as f64;

        let d_c_max = self.horizon.iter().map(|q| q.distance()).fold(0.0, f64::max);
        if d_c_max.is_finite() {
            let k = self.planner_info.num_iterations() as f64;
            self.d_max_mean = (k * self.d_max_mean + d_c_max) / (k + 1.0);
        }
        let d_mean = self.d_max_mean.max(EPSILON);

        for (i, w_dist) in weights_dist.iter().enumerate() {
            let Some(q) = self.horizon.get_mut(i) else { continue };
            if q.status() == HorizonStatus::Critical {
                q.set_weight(0.0);
                continue;
            }

            let d_c = q.distance();
            let d_c_prev = q.distance_previous();
            let change = if d_c.is_finite() && d_c_prev.is_finite() { (d_c - d_c_prev) / d_mean } else { 0.0 };
            let weight = d_c / d_mean + change + (w_dist - weights_dist_mean);
            let mut weight = weight.clamp(0.0, 1.0);
            if !q.is_on_path() {
                weight *= self.config.weight_min;
            }
            q.set_weight(weight);
        }

        // First maximum wins
        let mut best = eligible[0];
        for &i in &eligible[1..] {
            if self.horizon[i].weight() > self.horizon[best].weight() {
                best = i;
            }
        }

        let mut chosen = best;
        if self.horizon[best].is_on_path() {
            let best_weight = self.horizon[best].weight();
            let hysteresis = self.config.hysteresis;

            // Among near-equal weights prefer the state closest to the goal
            let mut d_min = dist_to_goal[best];
            for &i in &eligible {
                if (best_weight - self.horizon[i].weight()).abs() < hysteresis && dist_to_goal[i] < d_min {
                    d_min = dist_to_goal[i];
                    chosen = i;
                }
            }

            // Stay with the previous target unless the new one is clearly better
            if self.horizon[chosen].status() != HorizonStatus::Goal && self.horizon[chosen].id() != self.q_next.id() {
                if let Some(prev) = self.horizon.position(self.q_next.id()) {
                    let q_prev = &self.horizon[prev];
                    if q_prev.status() != HorizonStatus::Critical
                        && (best_weight - q_prev.weight()).abs() < hysteresis
                    {
                        chosen = prev;
                    }
                }
            }
        }

        self.q_next = self.horizon[chosen].clone();
        trace!(d_mean, "next target {}", self.q_next);
        if !self.q_next.is_on_path() && !self.predefined_path.is_empty() {
            debug!(weight = self.q_next.weight(), "target chosen off the predefined path, requesting a new one");
            self.scheduler.require_replanning();
        }
    }
}
