//! Common traits defining the collaborators of the replanning controller

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use rand::Rng;

use crate::common::types::*;

/// Configurations closer than this are treated as the same point
pub const EQUALITY_THRESHOLD: f64 = 1e-5;

/// Configuration-space oracle
///
/// Collision checking, distance estimation and sampling are delegated to
/// the implementor; the controller only composes these queries.
/// Implementors are cloned into background searches, so a clone must be a
/// snapshot that does not observe later environment updates.
pub trait ConfigurationSpace: Clone + Send + 'static {
    /// Number of degrees of freedom
    fn num_dimensions(&self) -> usize;

    /// Human readable space type (written to traces)
    fn space_type(&self) -> String {
        "RealVectorSpace".to_string()
    }

    /// Whether `q` is collision free and within bounds
    fn is_valid(&self, q: &Configuration) -> bool;

    /// Distance from `q` to the nearest obstacle.
    ///
    /// With `exact == false` an implementation may return a cheaper lower
    /// bound and omit the nearest points.
    fn compute_distance(&self, q: &Configuration, exact: bool) -> Clearance;

    /// Fast lower bound on the clearance of `q`, computed from nearest points
    /// cached at a nearby configuration
    fn compute_distance_underestimate(&self, q: &Configuration, nearest_points: &[NearestPoint]) -> f64;

    /// Configuration at most `step` away from `from` towards `to`
    fn interpolate_edge(&self, from: &Configuration, to: &Configuration, step: f64) -> Configuration {
        let dist = self.norm(from, to);
        if dist <= step {
            to.clone()
        } else {
            from.lerp(to, step / dist)
        }
    }

    /// Furthest configuration on the segment `from -> to` reachable without collision
    fn prune_edge(&self, from: &Configuration, to: &Configuration) -> Configuration;

    /// Random configuration, sampled with respect to `bias`
    fn random_state<R: Rng + ?Sized>(&self, rng: &mut R, bias: &Configuration) -> Configuration;

    fn is_equal(&self, a: &Configuration, b: &Configuration) -> bool {
        self.norm(a, b) < EQUALITY_THRESHOLD
    }

    fn norm(&self, a: &Configuration, b: &Configuration) -> f64 {
        a.distance(b)
    }

    /// Move the environment forward by `delta_time` seconds
    fn advance_environment(&mut self, delta_time: f64);
}

/// Global-search oracle: connects a start to a goal within a time budget
pub trait GlobalPlanner: Send {
    /// Identifier of the search strategy
    fn name(&self) -> &str;

    /// Attempt to find a path. Returns `false` on failure, when the budget
    /// runs out, or when `cancel` is raised.
    fn solve(&mut self, time_budget: Duration, cancel: &AtomicBool) -> bool;

    /// Discrete path from start to goal; empty unless `solve` succeeded
    fn path(&self) -> &[Configuration];

    /// Time spent inside the last `solve` call
    fn planning_time(&self) -> Duration;
}

/// Builds global planners for a given space snapshot
pub trait PlannerFactory<S: ConfigurationSpace>: Send + Sync {
    fn name(&self) -> String;

    fn create(&self, space: S, start: Configuration, goal: Configuration, seed: u64) -> Box<dyn GlobalPlanner>;
}
