//! Box-shaped configuration space with moving spherical obstacles
//!
//! Reference `ConfigurationSpace` used by the demo binary and the tests.
//! The agent is a sphere of radius `robot_radius` whose centre is the
//! configuration; obstacles drift with constant velocity and bounce off the
//! space bounds.

use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::common::{Clearance, Configuration, ConfigurationSpace, NearestPoint, RoboticsError, RoboticsResult};

/// Axis-aligned bounds of the configuration space
#[derive(Debug, Clone, PartialEq)]
pub struct AreaBounds {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl AreaBounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> RoboticsResult<Self> {
        if lower.len() != upper.len() || lower.is_empty() {
            return Err(RoboticsError::InvalidParameter(format!(
                "bounds must be non-empty and of equal length (got {} and {})",
                lower.len(),
                upper.len()
            )));
        }
        if lower.iter().zip(upper.iter()).any(|(lo, hi)| lo >= hi) {
            return Err(RoboticsError::InvalidParameter("lower bound must be below upper bound".to_string()));
        }
        Ok(Self { lower: DVector::from_vec(lower), upper: DVector::from_vec(upper) })
    }

    /// Same interval on every axis
    pub fn cube(dims: usize, min: f64, max: f64) -> RoboticsResult<Self> {
        Self::new(vec![min; dims], vec![max; dims])
    }

    pub fn dims(&self) -> usize {
        self.lower.len()
    }

    pub fn contains(&self, q: &Configuration) -> bool {
        q.dims() == self.dims()
            && q.coord()
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(x, (lo, hi))| x >= lo && x <= hi)
    }
}

/// Spherical obstacle moving with constant velocity
#[derive(Debug, Clone, PartialEq)]
pub struct SphereObstacle {
    pub center: DVector<f64>,
    pub radius: f64,
    pub velocity: DVector<f64>,
}

impl SphereObstacle {
    pub fn new(center: Vec<f64>, radius: f64, velocity: Vec<f64>) -> Self {
        Self {
            center: DVector::from_vec(center),
            radius,
            velocity: DVector::from_vec(velocity),
        }
    }

    pub fn fixed(center: Vec<f64>, radius: f64) -> Self {
        let dims = center.len();
        Self::new(center, radius, vec![0.0; dims])
    }
}

/// Obstacle entry of a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleConfig {
    pub center: Vec<f64>,
    pub radius: f64,
    #[serde(default)]
    pub velocity: Vec<f64>,
}

/// Scenario description: space, obstacles, start and goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
    #[serde(default = "default_robot_radius")]
    pub robot_radius: f64,
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    #[serde(default)]
    pub sampling_radius: Option<f64>,
    pub start: Vec<f64>,
    pub goal: Vec<f64>,
}

fn default_robot_radius() -> f64 {
    0.1
}

fn default_resolution() -> f64 {
    0.02
}

impl ScenarioConfig {
    pub fn from_yaml_str(yaml: &str) -> RoboticsResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> RoboticsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Planar scenario with two obstacles crossing the straight line to the goal
    pub fn planar_crossing() -> Self {
        Self {
            lower: vec![-1.0, -1.0],
            upper: vec![11.0, 11.0],
            obstacles: vec![
                ObstacleConfig { center: vec![3.0, 6.0], radius: 1.0, velocity: vec![0.0, -0.5] },
                ObstacleConfig { center: vec![7.0, 4.0], radius: 1.2, velocity: vec![0.0, 0.5] },
                ObstacleConfig { center: vec![5.0, 5.0], radius: 0.8, velocity: vec![0.0, 0.0] },
            ],
            robot_radius: default_robot_radius(),
            resolution: default_resolution(),
            sampling_radius: None,
            start: vec![0.0, 0.0],
            goal: vec![10.0, 10.0],
        }
    }

    pub fn build(&self) -> RoboticsResult<(MovingObstacleSpace, Configuration, Configuration)> {
        let bounds = AreaBounds::new(self.lower.clone(), self.upper.clone())?;
        let dims = bounds.dims();
        let mut obstacles = Vec::with_capacity(self.obstacles.len());
        for obs in &self.obstacles {
            let velocity = if obs.velocity.is_empty() { vec![0.0; dims] } else { obs.velocity.clone() };
            if obs.center.len() != dims || velocity.len() != dims {
                return Err(RoboticsError::InvalidParameter(format!(
                    "obstacle at {:?} does not match space dimensionality {}",
                    obs.center, dims
                )));
            }
            obstacles.push(SphereObstacle::new(obs.center.clone(), obs.radius, velocity));
        }
        if self.start.len() != dims || self.goal.len() != dims {
            return Err(RoboticsError::InvalidParameter(format!(
                "start and goal must have {} coordinates",
                dims
            )));
        }

        let mut space = MovingObstacleSpace::new(bounds, obstacles, self.robot_radius, self.resolution)?;
        if let Some(radius) = self.sampling_radius {
            space = space.with_sampling_radius(radius);
        }
        Ok((space, Configuration::new(self.start.clone()), Configuration::new(self.goal.clone())))
    }
}

/// Configuration space with moving spherical obstacles
#[derive(Debug, Clone)]
pub struct MovingObstacleSpace {
    bounds: AreaBounds,
    obstacles: Vec<SphereObstacle>,
    robot_radius: f64,
    resolution: f64,
    sampling_radius: Option<f64>,
    time: f64,
}

impl MovingObstacleSpace {
    pub fn new(
        bounds: AreaBounds,
        obstacles: Vec<SphereObstacle>,
        robot_radius: f64,
        resolution: f64,
    ) -> RoboticsResult<Self> {
        if resolution <= 0.0 {
            return Err(RoboticsError::InvalidParameter("resolution must be positive".to_string()));
        }
        if robot_radius < 0.0 {
            return Err(RoboticsError::InvalidParameter("robot radius must not be negative".to_string()));
        }
        Ok(Self {
            bounds,
            obstacles,
            robot_radius,
            resolution,
            sampling_radius: None,
            time: 0.0,
        })
    }

    /// Sample random states within `radius` of the bias configuration
    pub fn with_sampling_radius(mut self, radius: f64) -> Self {
        self.sampling_radius = Some(radius);
        self
    }

    pub fn bounds(&self) -> &AreaBounds {
        &self.bounds
    }

    pub fn obstacles(&self) -> &[SphereObstacle] {
        &self.obstacles
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    fn obstacle_distance(&self, obs: &SphereObstacle, q: &Configuration) -> f64 {
        (q.coord() - &obs.center).norm() - obs.radius - self.robot_radius
    }

    fn nearest_point(obs: &SphereObstacle, q: &Configuration) -> NearestPoint {
        let offset = q.coord() - &obs.center;
        let norm = offset.norm();
        let normal = if norm > 0.0 {
            offset / norm
        } else {
            let mut axis = DVector::zeros(obs.center.len());
            axis[0] = 1.0;
            axis
        };
        NearestPoint::new(&obs.center + &normal * obs.radius, normal)
    }
}

impl ConfigurationSpace for MovingObstacleSpace {
    fn num_dimensions(&self) -> usize {
        self.bounds.dims()
    }

    fn space_type(&self) -> String {
        format!("MovingObstacles{}D", self.num_dimensions())
    }

    fn is_valid(&self, q: &Configuration) -> bool {
        self.bounds.contains(q) && self.obstacles.iter().all(|obs| self.obstacle_distance(obs, q) > 0.0)
    }

    fn compute_distance(&self, q: &Configuration, exact: bool) -> Clearance {
        if self.obstacles.is_empty() {
            return Clearance::unbounded();
        }
        let distance = self
            .obstacles
            .iter()
            .map(|obs| self.obstacle_distance(obs, q))
            .fold(f64::INFINITY, f64::min);
        let nearest_points = if exact {
            self.obstacles.iter().map(|obs| Self::nearest_point(obs, q)).collect()
        } else {
            Vec::new()
        };
        Clearance::new(distance, nearest_points)
    }

    fn compute_distance_underestimate(&self, q: &Configuration, nearest_points: &[NearestPoint]) -> f64 {
        nearest_points
            .iter()
            .map(|np| np.plane_distance(q) - self.robot_radius)
            .fold(f64::INFINITY, f64::min)
    }

    fn prune_edge(&self, from: &Configuration, to: &Configuration) -> Configuration {
        if !self.is_valid(from) {
            return from.clone();
        }
        let dist = self.norm(from, to);
        let num_steps = (dist / self.resolution).ceil() as usize;
        let mut last_valid = from.clone();
        for i in 1..=num_steps {
            let q = from.lerp(to, i as f64 / num_steps as f64);
            if !self.is_valid(&q) {
                return last_valid;
            }
            last_valid = q;
        }
        to.clone()
    }

    fn random_state<R: Rng + ?Sized>(&self, rng: &mut R, bias: &Configuration) -> Configuration {
        let coord = (0..self.num_dimensions())
            .map(|k| {
                let (lo, hi) = match self.sampling_radius {
                    Some(r) => (
                        (bias.coord()[k] - r).max(self.bounds.lower[k]),
                        (bias.coord()[k] + r).min(self.bounds.upper[k]),
                    ),
                    None => (self.bounds.lower[k], self.bounds.upper[k]),
                };
                if lo < hi {
                    Uniform::new_inclusive(lo, hi).sample(rng)
                } else {
                    lo
                }
            })
            .collect();
        Configuration::new(coord)
    }

    fn advance_environment(&mut self, delta_time: f64) {
        let bounds = &self.bounds;
        for obs in &mut self.obstacles {
            obs.center += &obs.velocity * delta_time;
            for k in 0..obs.center.len() {
                if obs.center[k] < bounds.lower[k] {
                    obs.center[k] = 2.0 * bounds.lower[k] - obs.center[k];
                    obs.velocity[k] = -obs.velocity[k];
                } else if obs.center[k] > bounds.upper[k] {
                    obs.center[k] = 2.0 * bounds.upper[k] - obs.center[k];
                    obs.velocity[k] = -obs.velocity[k];
                }
            }
        }
        self.time += delta_time;
    }
}
