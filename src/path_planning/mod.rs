//! Global path planning algorithms
//!
//! The replanning controller selects one of these by name. The set is
//! closed: unknown names are rejected while the configuration is read.

pub mod rrt;
pub mod rrt_connect;

pub use rrt::*;
pub use rrt_connect::*;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::{Configuration, ConfigurationSpace, GlobalPlanner, PlannerFactory, RoboticsError};

/// Available global planners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlobalPlannerKind {
    #[serde(rename = "RRT")]
    Rrt,
    #[serde(rename = "RRTConnect")]
    RrtConnect,
}

impl GlobalPlannerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalPlannerKind::Rrt => "RRT",
            GlobalPlannerKind::RrtConnect => "RRTConnect",
        }
    }
}

impl fmt::Display for GlobalPlannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlobalPlannerKind {
    type Err = RoboticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RRT" => Ok(GlobalPlannerKind::Rrt),
            "RRTConnect" => Ok(GlobalPlannerKind::RrtConnect),
            other => Err(RoboticsError::UnknownPlanner(other.to_string())),
        }
    }
}

/// Global planner selection together with its tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalPlannerConfig {
    pub name: GlobalPlannerKind,
    #[serde(flatten)]
    pub rrt: RRTConfig,
}

impl Default for GlobalPlannerConfig {
    fn default() -> Self {
        Self {
            name: GlobalPlannerKind::RrtConnect,
            rrt: RRTConfig::default(),
        }
    }
}

impl<S: ConfigurationSpace> PlannerFactory<S> for GlobalPlannerConfig {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn create(&self, space: S, start: Configuration, goal: Configuration, seed: u64) -> Box<dyn GlobalPlanner> {
        match self.name {
            GlobalPlannerKind::Rrt => Box::new(RRTPlanner::new(space, start, goal, self.rrt.clone(), seed)),
            GlobalPlannerKind::RrtConnect => {
                Box::new(RRTConnectPlanner::new(space, start, goal, self.rrt.clone(), seed))
            }
        }
    }
}
