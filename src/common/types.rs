//! Common types used throughout rust_replanning

use std::fmt;

use itertools::Itertools;
use nalgebra::DVector;

/// A point in an N-dimensional configuration space
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    coord: DVector<f64>,
}

impl Configuration {
    pub fn new(coord: Vec<f64>) -> Self {
        Self { coord: DVector::from_vec(coord) }
    }

    pub fn from_vector(coord: DVector<f64>) -> Self {
        Self { coord }
    }

    pub fn zeros(dims: usize) -> Self {
        Self { coord: DVector::zeros(dims) }
    }

    pub fn coord(&self) -> &DVector<f64> {
        &self.coord
    }

    pub fn dims(&self) -> usize {
        self.coord.len()
    }

    pub fn distance(&self, other: &Configuration) -> f64 {
        (&self.coord - &other.coord).norm()
    }

    /// Point on the segment towards `other` at fraction `t` of its length
    pub fn lerp(&self, other: &Configuration, t: f64) -> Configuration {
        Self::from_vector(&self.coord + (&other.coord - &self.coord) * t)
    }
}

impl From<Vec<f64>> for Configuration {
    fn from(coord: Vec<f64>) -> Self {
        Self::new(coord)
    }
}

impl From<DVector<f64>> for Configuration {
    fn from(coord: DVector<f64>) -> Self {
        Self::from_vector(coord)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.coord.iter().join(" "))
    }
}

/// Nearest point on an obstacle together with the outward surface normal
/// pointing towards the configuration it was measured from.
///
/// The half-space bounded by the tangent plane through `point` contains the
/// obstacle, so the signed distance to that plane underestimates the real
/// clearance of any nearby configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestPoint {
    pub point: DVector<f64>,
    pub normal: DVector<f64>,
}

impl NearestPoint {
    pub fn new(point: DVector<f64>, normal: DVector<f64>) -> Self {
        Self { point, normal }
    }

    pub fn plane_distance(&self, q: &Configuration) -> f64 {
        (q.coord() - &self.point).dot(&self.normal)
    }
}

/// Clearance of a configuration along with the witnesses used to compute it
#[derive(Debug, Clone, PartialEq)]
pub struct Clearance {
    pub distance: f64,
    pub nearest_points: Vec<NearestPoint>,
}

impl Clearance {
    pub fn new(distance: f64, nearest_points: Vec<NearestPoint>) -> Self {
        Self { distance, nearest_points }
    }

    pub fn unbounded() -> Self {
        Self { distance: f64::INFINITY, nearest_points: Vec::new() }
    }
}

/// Progress made towards the next target within a single motion step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionStatus {
    Reached,
    Advanced,
    Trapped,
}

/// Executed configuration with the index of its predecessor
#[derive(Debug, Clone, PartialEq)]
pub struct RealizedState {
    pub configuration: Configuration,
    pub parent: Option<usize>,
}

/// Append-only trajectory actually executed by the agent
#[derive(Debug, Clone, Default)]
pub struct RealizedPath {
    nodes: Vec<RealizedState>,
}

impl RealizedPath {
    pub fn new(start: Configuration) -> Self {
        Self { nodes: vec![RealizedState { configuration: start, parent: None }] }
    }

    /// Extend the trajectory; the new node points at the previous tip
    pub fn push(&mut self, configuration: Configuration) -> usize {
        let parent = self.nodes.len().checked_sub(1);
        self.nodes.push(RealizedState { configuration, parent });
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn last(&self) -> Option<&Configuration> {
        self.nodes.last().map(|n| &n.configuration)
    }

    pub fn get(&self, index: usize) -> Option<&RealizedState> {
        self.nodes.get(index)
    }

    pub fn configurations(&self) -> impl Iterator<Item = &Configuration> {
        self.nodes.iter().map(|n| &n.configuration)
    }

    /// Walk predecessor links from `index` back to the start
    pub fn trace_back(&self, index: usize) -> Vec<&Configuration> {
        let mut states = Vec::new();
        let mut node_index = Some(index);
        while let Some(i) = node_index {
            match self.nodes.get(i) {
                Some(node) => {
                    states.push(&node.configuration);
                    node_index = node.parent;
                }
                None => break,
            }
        }
        states
    }

    pub fn total_length(&self) -> f64 {
        self.nodes
            .iter()
            .tuple_windows()
            .map(|(a, b)| a.configuration.distance(&b.configuration))
            .sum()
    }
}
