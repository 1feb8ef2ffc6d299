//! RRT-Connect path planning algorithm
//!
//! Bidirectional variant of RRT: one tree grows from the start, one from
//! the goal, and after every extension the opposite tree greedily tries to
//! connect to the new node.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::common::{Configuration, ConfigurationSpace, GlobalPlanner};
use crate::path_planning::rrt::{extend, trace_to_root, Extension, RRTConfig, RRTNode};

/// RRT-Connect path planner
pub struct RRTConnectPlanner<S: ConfigurationSpace> {
    config: RRTConfig,
    space: S,
    start: Configuration,
    goal: Configuration,
    start_tree: Vec<RRTNode>,
    goal_tree: Vec<RRTNode>,
    path: Vec<Configuration>,
    planning_time: Duration,
    rng: StdRng,
}

impl<S: ConfigurationSpace> RRTConnectPlanner<S> {
    pub fn new(space: S, start: Configuration, goal: Configuration, config: RRTConfig, seed: u64) -> Self {
        RRTConnectPlanner {
            config,
            space,
            start,
            goal,
            start_tree: Vec::new(),
            goal_tree: Vec::new(),
            path: Vec::new(),
            planning_time: Duration::ZERO,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Trees grown during the last `solve` call (start tree, goal tree)
    pub fn get_trees(&self) -> (&[RRTNode], &[RRTNode]) {
        (&self.start_tree, &self.goal_tree)
    }

    fn connect(space: &S, tree: &mut Vec<RRTNode>, q: &Configuration, expand_dis: f64) -> Extension {
        loop {
            match extend(space, tree, q, expand_dis) {
                Extension::Advanced(_) => continue,
                other => return other,
            }
        }
    }

    fn generate_final_course(&self, start_ind: usize, goal_ind: usize) -> Vec<Configuration> {
        let mut points = trace_to_root(&self.start_tree, start_ind);
        points.reverse();
        points.extend(trace_to_root(&self.goal_tree, goal_ind).into_iter().skip(1));
        points
    }
}

impl<S: ConfigurationSpace> GlobalPlanner for RRTConnectPlanner<S> {
    fn name(&self) -> &str {
        "RRTConnect"
    }

    fn solve(&mut self, time_budget: Duration, cancel: &AtomicBool) -> bool {
        let time_start = Instant::now();
        self.start_tree = vec![RRTNode::new(self.start.clone(), None)];
        self.goal_tree = vec![RRTNode::new(self.goal.clone(), None)];
        self.path.clear();

        let mut solved = false;
        if self.space.is_valid(&self.start) && self.space.is_valid(&self.goal) {
            // Trees swap roles every iteration; `grow_start` tells which one is extended
            let mut grow_start = true;
            for _ in 0..self.config.max_iter {
                if cancel.load(Ordering::Relaxed) || time_start.elapsed() >= time_budget {
                    break;
                }

                let q_rand = self.space.random_state(&mut self.rng, &self.start);
                let (grown, other) = if grow_start {
                    (&mut self.start_tree, &mut self.goal_tree)
                } else {
                    (&mut self.goal_tree, &mut self.start_tree)
                };

                if let Extension::Advanced(new_ind) | Extension::Reached(new_ind) =
                    extend(&self.space, grown, &q_rand, self.config.expand_dis)
                {
                    let q_new = grown[new_ind].configuration.clone();
                    let extension = Self::connect(&self.space, other, &q_new, self.config.expand_dis);
                    if let Extension::Reached(other_ind) = extension {
                        self.path = if grow_start {
                            self.generate_final_course(new_ind, other_ind)
                        } else {
                            self.generate_final_course(other_ind, new_ind)
                        };
                        solved = true;
                        break;
                    }
                }
                grow_start = !grow_start;
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
