//! Plain-text run trace
//!
//! ```text
//! Space Type:      MovingObstacles2D
//! Dimensionality:  2
//! Planner type:    DRGBT (RRTConnect)
//! Planner info:
//!      Succesfull:           yes
//!      Number of iterations: 120
//!      Planning time [ms]:   6000.000
//! Path:
//! q0: (0 0)
//! ...
//! -------------------------
//! ```

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::common::{ConfigurationSpace, RealizedPath, RoboticsResult};
use crate::dynamic_planning::drgbt::DrgbtPlanner;
use crate::dynamic_planning::telemetry::PlannerInfo;

pub const PLANNER_NAME: &str = "DRGBT";

/// Write one trace record to `out`
pub fn write_trace<W: Write>(
    out: &mut W,
    space_type: &str,
    num_dimensions: usize,
    global_planner: &str,
    info: &PlannerInfo,
    path: Option<&RealizedPath>,
) -> io::Result<()> {
    writeln!(out, "Space Type:      {}", space_type)?;
    writeln!(out, "Dimensionality:  {}", num_dimensions)?;
    writeln!(out, "Planner type:    {} ({})", PLANNER_NAME, global_planner)?;
    writeln!(out, "Planner info:")?;
    writeln!(out, "\t Succesfull:           {}", if info.success() { "yes" } else { "no" })?;
    writeln!(out, "\t Number of iterations: {}", info.num_iterations())?;
    writeln!(out, "\t Planning time [ms]:   {:.3}", info.planning_time().as_secs_f64() * 1e3)?;

    if let Some(path) = path {
        writeln!(out, "Path:")?;
        for (i, q) in path.configurations().enumerate() {
            writeln!(out, "q{}: ({})", i, q)?;
        }
    }
    writeln!(out, "{}", "-".repeat(25))?;
    Ok(())
}

impl<S: ConfigurationSpace> DrgbtPlanner<S> {
    /// Write the run trace to `path`, appending to an existing file when asked
    pub fn output_planner_data(&self, path: impl AsRef<Path>, include_path: bool, append: bool) -> RoboticsResult<()> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        let mut out = BufWriter::new(file);

        write_trace(
            &mut out,
            &self.space.space_type(),
            self.space.num_dimensions(),
            &self.scheduler.planner_name(),
            &self.planner_info,
            include_path.then_some(&self.path),
        )?;
        out.flush()?;
        info!(path = %path.display(), "planner data written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Configuration, RoboticsError};
    use crate::dynamic_planning::test_support::*;
    use std::time::Duration;

    fn finished_info() -> PlannerInfo {
        let mut info = PlannerInfo::default();
        info.record_iteration(Duration::from_millis(50));
        info.set_outcome(true, Duration::from_micros(51_500));
        info
    }

    #[test]
    fn test_trace_format() {
        let mut path = RealizedPath::new(Configuration::new(vec![0.0, 0.0]));
        path.push(Configuration::new(vec![0.1, 0.0]));
        let mut out = Vec::new();

        write_trace(&mut out, "RealVectorSpace", 2, "RRT", &finished_info(), Some(&path)).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Space Type:      RealVectorSpace");
        assert_eq!(lines[2], "Planner type:    DRGBT (RRT)");
        assert_eq!(lines[4], "\t Succesfull:           yes");
        assert_eq!(lines[6], "\t Planning time [ms]:   51.500");
        assert_eq!(lines[7], "Path:");
        assert_eq!(lines[9], "q1: (0.1 0)");
        assert_eq!(lines.last(), Some(&"-------------------------"));
    }

    #[test]
    fn test_trace_without_path() {
        let mut out = Vec::new();
        write_trace(&mut out, "RealVectorSpace", 3, "RRTConnect", &PlannerInfo::default(), None).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("Path:"));
        assert!(text.contains("Succesfull:           no"));
    }

    #[test]
    fn test_output_planner_data_appends() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("trace.log");
        let planner = open_planner(2, DrgbtConfig::default());

        planner.output_planner_data(&file, true, false).unwrap();
        planner.output_planner_data(&file, false, true).unwrap();

        let text = std::fs::read_to_string(&file).unwrap();
        assert_eq!(text.matches("Planner type:").count(), 2);
        assert_eq!(text.matches("Path:").count(), 1);
    }

    #[test]
    fn test_output_planner_data_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing").join("trace.log");
        let planner = open_planner(2, DrgbtConfig::default());

        assert!(matches!(planner.output_planner_data(&file, true, false), Err(RoboticsError::Io(_))));
    }
}
