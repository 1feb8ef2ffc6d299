//! RRT (Rapidly-exploring Random Tree) path planning algorithm
//!
//! Sampling-based path planning algorithm that builds a tree by
//! randomly sampling the configuration space. Works on any
//! `ConfigurationSpace`, so it can serve as the global planner of the
//! replanning controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::common::{Configuration, ConfigurationSpace, GlobalPlanner};

/// Internal node for RRT trees
#[derive(Debug, Clone)]
pub struct RRTNode {
    pub configuration: Configuration,
    pub parent: Option<usize>,
}

impl RRTNode {
    pub fn new(configuration: Configuration, parent: Option<usize>) -> Self {
        RRTNode { configuration, parent }
    }
}

/// Configuration for RRT planners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RRTConfig {
    /// Expansion distance per step
    pub expand_dis: f64,
    /// Goal sampling rate (0-100)
    pub goal_sample_rate: i32,
    /// Maximum iterations
    pub max_iter: usize,
}

impl Default for RRTConfig {
    fn default() -> Self {
        Self {
            expand_dis: 0.5,
            goal_sample_rate: 5,
            max_iter: 100_000,
        }
    }
}

/// Result of growing a tree towards a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extension {
    Trapped,
    Advanced(usize),
    Reached(usize),
}

pub(crate) fn get_nearest_node_index<S: ConfigurationSpace>(space: &S, tree: &[RRTNode], q: &Configuration) -> usize {
    let mut min_dist = f64::INFINITY;
    let mut min_ind = 0;

    for (i, node) in tree.iter().enumerate() {
        let dist = space.norm(&node.configuration, q);
        if dist < min_dist {
            min_dist = dist;
            min_ind = i;
        }
    }

    min_ind
}

/// Grow `tree` by at most `expand_dis` towards `q`; the new edge must be collision free
pub(crate) fn extend<S: ConfigurationSpace>(
    space: &S,
    tree: &mut Vec<RRTNode>,
    q: &Configuration,
    expand_dis: f64,
) -> Extension {
    let nearest_ind = get_nearest_node_index(space, tree, q);
    let from = tree[nearest_ind].configuration.clone();
    let q_new = space.interpolate_edge(&from, q, expand_dis);
    if space.is_equal(&from, &q_new) {
        return Extension::Trapped;
    }
    let q_pruned = space.prune_edge(&from, &q_new);
    if !space.is_equal(&q_pruned, &q_new) {
        return Extension::Trapped;
    }

    let reached = space.is_equal(&q_new, q);
    tree.push(RRTNode::new(q_new, Some(nearest_ind)));
    let new_ind = tree.len() - 1;
    if reached {
        Extension::Reached(new_ind)
    } else {
        Extension::Advanced(new_ind)
    }
}

/// Configurations from `index` back to the root of `tree`
pub(crate) fn trace_to_root(tree: &[RRTNode], index: usize) -> Vec<Configuration> {
    let mut points = Vec::new();
    let mut node_index = Some(index);

    while let Some(i) = node_index {
        let node = &tree[i];
        points.push(node.configuration.clone());
        node_index = node.parent;
    }

    points
}

/// RRT path planner
pub struct RRTPlanner<S: ConfigurationSpace> {
    config: RRTConfig,
    space: S,
    start: Configuration,
    goal: Configuration,
    node_list: Vec<RRTNode>,
    path: Vec<Configuration>,
    planning_time: Duration,
    rng: StdRng,
}

impl<S: ConfigurationSpace> RRTPlanner<S> {
    /// Create a new RRT planner
    pub fn new(space: S, start: Configuration, goal: Configuration, config: RRTConfig, seed: u64) -> Self {
        RRTPlanner {
            config,
            space,
            start,
            goal,
            node_list: Vec::new(),
            path: Vec::new(),
            planning_time: Duration::ZERO,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn get_random_node(&mut self) -> Configuration {
        if self.rng.gen_range(0..=100) > self.config.goal_sample_rate {
            self.space.random_state(&mut self.rng, &self.start)
        } else {
            self.goal.clone()
        }
    }

    fn generate_final_course(&self, goal_ind: usize) -> Vec<Configuration> {
        let mut points = trace_to_root(&self.node_list, goal_ind);
        points.reverse();
        if !self.space.is_equal(points.last().unwrap_or(&self.start), &self.goal) {
            points.push(self.goal.clone());
        }
        points
    }
}

impl<S: ConfigurationSpace> GlobalPlanner for RRTPlanner<S> {
    fn name(&self) -> &str {
        "RRT"
    }

    fn solve(&mut self, time_budget: Duration, cancel: &AtomicBool) -> bool {
        let time_start = Instant::now();
        self.node_list = vec![RRTNode::new(self.start.clone(), None)];
        self.path.clear();

        let mut solved = false;
        if self.space.is_valid(&self.start) {
            for _ in 0..self.config.max_iter {
                if cancel.load(Ordering::Relaxed) || time_start.elapsed() >= time_budget {
                    break;
                }

                let rnd_node = self.get_random_node();
                let new_ind = match extend(&self.space, &mut self.node_list, &rnd_node, self.config.expand_dis) {
                    Extension::Advanced(i) | Extension::Reached(i) => i,
                    Extension::Trapped => continue,
                };

                let last = self.node_list[new_ind].configuration.clone();
                if self.space.norm(&last, &self.goal) <= self.config.expand_dis {
                    let q_final = self.space.prune_edge(&last, &self.goal);
                    if self.space.is_equal(&q_final, &self.goal) {
                        self.path = self.generate_final_course(new_ind);
                        solved = true;
                        break;
                    }
                }
            }
        }

        self.planning_time = time_start.elapsed();
        solved && self.planning_time <= time_budget
    }

    fn path(&self) -> &[Configuration] {
        &self.path
    }

    fn planning_time(&self) -> Duration {
        self.planning_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{AreaBounds, MovingObstacleSpace, SphereObstacle};

    fn create_test_space() -> MovingObstacleSpace {
        let obstacles = vec![
            SphereObstacle::fixed(vec![5.0, 5.0], 1.0),
            SphereObstacle::fixed(vec![3.0, 6.0], 2.0),
            SphereObstacle::fixed(vec![7.0, 5.0], 2.0),
        ];
        let bounds = AreaBounds::cube(2, -2.0, 15.0).unwrap();
        MovingObstacleSpace::new(bounds, obstacles, 0.1, 0.05).unwrap()
    }

    #[test]
    fn test_rrt_finds_collision_free_path() {
        let space = create_test_space();
        let start = Configuration::new(vec![0.0, 0.0]);
        let goal = Configuration::new(vec![10.0, 10.0]);
        let mut planner = RRTPlanner::new(space.clone(), start.clone(), goal.clone(), RRTConfig::default(), 7);

        let solved = planner.solve(Duration::from_secs(5), &AtomicBool::new(false));
        assert!(solved);

        let path = planner.path();
        assert!(space.is_equal(&path[0], &start));
        assert!(space.is_equal(path.last().unwrap(), &goal));
        for pair in path.windows(2) {
            assert!(space.is_equal(&space.prune_edge(&pair[0], &pair[1]), &pair[1]));
        }
    }

    #[test]
    fn test_rrt_honours_cancellation() {
        let space = create_test_space();
        let mut planner = RRTPlanner::new(
            space,
            Configuration::new(vec![0.0, 0.0]),
            Configuration::new(vec![10.0, 10.0]),
            RRTConfig::default(),
            7,
        );
        assert!(!planner.solve(Duration::from_secs(5), &AtomicBool::new(true)));
        assert!(planner.path().is_empty());
    }

    #[test]
    fn test_rrt_rejects_invalid_start() {
        let space = create_test_space();
        let mut planner = RRTPlanner::new(
            space,
            Configuration::new(vec![5.0, 5.0]),
            Configuration::new(vec![10.0, 10.0]),
            RRTConfig::default(),
            7,
        );
        assert!(!planner.solve(Duration::from_secs(1), &AtomicBool::new(false)));
    }

    #[test]
    fn test_rrt_config_default() {
        let config = RRTConfig::default();
        assert_eq!(config.expand_dis, 0.5);
        assert_eq!(config.goal_sample_rate, 5);
    }
}
