//! Tuning parameters of the DRGBT replanning controller

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{RoboticsError, RoboticsResult};
use crate::path_planning::GlobalPlannerConfig;

/// Real-time scheduling policy shared by local tracking and replanning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RealTimeScheduling {
    /// Fixed priority: replanning only gets what local tracking leaves over
    #[serde(rename = "FPS")]
    Fixed,
    /// Dynamic priority: replanning may borrow the next iteration's reserved slice
    #[serde(rename = "DPS")]
    Dynamic,
    /// No scheduling: bur generation is never cut off
    #[serde(rename = "None")]
    Unscheduled,
}

/// Configuration for the DRGBT planner
///
/// Every key is optional when loading from YAML; missing keys fall back to
/// the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrgbtConfig {
    /// Maximum number of control iterations
    pub max_num_iter: usize,
    /// Wall-clock budget of a single iteration [ms]
    pub max_iter_time_ms: f64,
    /// Wall-clock budget of the whole run [ms]
    pub max_planning_time_ms: f64,
    /// Horizon size when clearance is large
    pub init_horizon_size: usize,
    /// Maximal motion step per iteration
    pub step: f64,
    /// Weight scale of off-path states and replanning threshold on the max weight
    pub weight_min: f64,
    /// Replanning threshold on the mean weight
    pub weight_mean_min: f64,
    /// Critical distance-to-obstacles
    pub d_crit: f64,
    /// Sub-points checked along the last executed motion
    pub max_num_validity_checks: usize,
    pub real_time_scheduling: RealTimeScheduling,
    /// Share of the iteration reserved for local tracking, in (0, 1]
    pub task1_utility: f64,
    /// Weight band within which target choices are considered equal
    pub hysteresis: f64,
    /// Repair attempts per bad or critical horizon state
    pub max_repair_attempts: usize,
    /// Spine length used for lateral and repaired states
    pub lateral_delta: f64,
    pub static_planner: GlobalPlannerConfig,
    /// Seed of the planner's random generator; entropy when absent
    pub seed: Option<u64>,
}

impl Default for DrgbtConfig {
    fn default() -> Self {
        Self {
            max_num_iter: 10_000,
            max_iter_time_ms: 50.0,
            max_planning_time_ms: 10_000.0,
            init_horizon_size: 10,
            step: 0.1,
            weight_min: 0.5,
            weight_mean_min: 0.2,
            d_crit: 0.05,
            max_num_validity_checks: 10,
            real_time_scheduling: RealTimeScheduling::Fixed,
            task1_utility: 0.5,
            hysteresis: 0.1,
            max_repair_attempts: 10,
            lateral_delta: 0.5,
            static_planner: GlobalPlannerConfig::default(),
            seed: None,
        }
    }
}

impl DrgbtConfig {
    pub fn from_yaml_str(yaml: &str) -> RoboticsResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> RoboticsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> RoboticsResult<()> {
        fn invalid(msg: &str) -> RoboticsResult<()> {
            Err(RoboticsError::InvalidParameter(msg.to_string()))
        }

        if self.max_num_iter == 0 {
            return invalid("max_num_iter must be positive");
        }
        if !(self.max_iter_time_ms > 0.0) || !(self.max_planning_time_ms > 0.0) {
            return invalid("time budgets must be positive");
        }
        if self.init_horizon_size < 2 {
            return invalid("init_horizon_size must be at least 2");
        }
        if !(self.step > 0.0) || !(self.lateral_delta > 0.0) {
            return invalid("step and lateral_delta must be positive");
        }
        if !(0.0..=1.0).contains(&self.weight_min) || !(0.0..=1.0).contains(&self.weight_mean_min) {
            return invalid("weight thresholds must lie in [0, 1]");
        }
        if !(self.task1_utility > 0.0 && self.task1_utility <= 1.0) {
            return invalid("task1_utility must lie in (0, 1]");
        }
        if self.d_crit < 0.0 || self.hysteresis < 0.0 {
            return invalid("d_crit and hysteresis must not be negative");
        }
        if self.max_num_validity_checks == 0 {
            return invalid("max_num_validity_checks must be positive");
        }
        if !(self.static_planner.rrt.expand_dis > 0.0) {
            return invalid("static planner expand_dis must be positive");
        }
        Ok(())
    }

    pub fn max_iter_time(&self) -> Duration {
        millis(self.max_iter_time_ms)
    }

    pub fn max_planning_time(&self) -> Duration {
        millis(self.max_planning_time_ms)
    }

    /// Slice of an iteration available to local tracking
    pub fn task1_time(&self) -> Duration {
        self.max_iter_time().mul_f64(self.task1_utility)
    }

    /// Slice of an iteration reserved for replanning
    pub fn task2_time(&self) -> Duration {
        self.max_iter_time().saturating_sub(self.task1_time())
    }
}

fn millis(ms: f64) -> Duration {
    Duration::from_nanos((ms.max(0.0) * 1e6).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_planning::GlobalPlannerKind;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DrgbtConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let yaml = r#"
max_iter_time_ms: 100
real_time_scheduling: DPS
static_planner:
  name: RRT
  expand_dis: 0.2
"#;
        let config = DrgbtConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_iter_time(), Duration::from_millis(100));
        assert_eq!(config.real_time_scheduling, RealTimeScheduling::Dynamic);
        assert_eq!(config.static_planner.name, GlobalPlannerKind::Rrt);
        assert_eq!(config.init_horizon_size, DrgbtConfig::default().init_horizon_size);
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let config = DrgbtConfig::from_yaml_file(concat!(env!("CARGO_MANIFEST_DIR"), "/data/drgbt.yaml")).unwrap();
        assert_eq!(config, DrgbtConfig::default());
    }

    #[test]
    fn test_unknown_planner_is_rejected() {
        let yaml = "static_planner:\n  name: RGBTConnect\n";
        assert!(matches!(DrgbtConfig::from_yaml_str(yaml), Err(RoboticsError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let config = DrgbtConfig { task1_utility: 1.5, ..Default::default() };
        assert!(matches!(config.validate(), Err(RoboticsError::InvalidParameter(_))));

        let config = DrgbtConfig { init_horizon_size: 1, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_time_slices() {
        let config = DrgbtConfig { max_iter_time_ms: 40.0, task1_utility: 0.75, ..Default::default() };
        assert_eq!(config.task1_time(), Duration::from_millis(30));
        assert_eq!(config.task2_time(), Duration::from_millis(10));
    }
}
