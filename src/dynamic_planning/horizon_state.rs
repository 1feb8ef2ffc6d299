//! Candidate next configuration of the agent

use std::fmt;

use crate::common::Configuration;

/// Stable handle of a horizon state
///
/// Handles are never reused, so "is this still the chosen target" is a
/// handle comparison rather than a pointer comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HorizonId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HorizonStatus {
    Normal,
    Bad,
    Critical,
    Goal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HorizonState {
    id: HorizonId,
    configuration: Configuration,
    /// Position on the predefined path, `None` for random and lateral states
    path_index: Option<usize>,
    reached: Configuration,
    is_reached: bool,
    status: HorizonStatus,
    distance: f64,
    distance_previous: Option<f64>,
    weight: f64,
}

impl HorizonState {
    pub fn new(id: HorizonId, configuration: Configuration, path_index: Option<usize>) -> Self {
        Self {
            id,
            reached: configuration.clone(),
            configuration,
            path_index,
            is_reached: false,
            status: HorizonStatus::Normal,
            distance: 0.0,
            distance_previous: None,
            weight: 0.0,
        }
    }

    pub fn id(&self) -> HorizonId {
        self.id
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn path_index(&self) -> Option<usize> {
        self.path_index
    }

    pub fn is_on_path(&self) -> bool {
        self.path_index.is_some()
    }

    pub fn reached(&self) -> &Configuration {
        &self.reached
    }

    pub fn is_reached(&self) -> bool {
        self.is_reached
    }

    pub fn status(&self) -> HorizonStatus {
        self.status
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Clearance from the previous evaluation; equals `distance` until the
    /// state has been evaluated twice
    pub fn distance_previous(&self) -> f64 {
        self.distance_previous.unwrap_or(self.distance)
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_reached(&mut self, reached: Configuration, is_reached: bool) {
        self.reached = reached;
        self.is_reached = is_reached;
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn mark_goal(&mut self) {
        self.status = HorizonStatus::Goal;
    }

    /// Record a new clearance measurement and update the status.
    ///
    /// Goal is sticky. Otherwise clearance below `d_crit` makes the state
    /// Critical and shrinking clearance makes a Normal state Bad; a degraded
    /// state never turns Normal again, it can only be replaced.
    pub fn record_distance(&mut self, distance: f64, d_crit: f64) {
        self.distance_previous = Some(match self.distance_previous {
            None => distance,
            Some(_) => self.distance,
        });
        self.distance = distance;

        if self.status == HorizonStatus::Goal {
            return;
        }
        if distance < d_crit {
            self.status = HorizonStatus::Critical;
            self.weight = 0.0;
        } else if distance < self.distance_previous() && self.status == HorizonStatus::Normal {
            self.status = HorizonStatus::Bad;
        }
    }

    #[cfg(test)]
    pub(crate) fn with_measurements(mut self, distance: f64, distance_previous: f64, status: HorizonStatus) -> Self {
        self.distance = distance;
        self.distance_previous = Some(distance_previous);
        self.status = status;
        self
    }
}

impl fmt::Display for HorizonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "q: ({}) reached: ({}) index: {:?} status: {:?} d_c: {:.4} d_c_prev: {:.4} weight: {:.4}",
            self.configuration,
            self.reached,
            self.path_index,
            self.status,
            self.distance,
            self.distance_previous(),
            self.weight
        )
    }
}
