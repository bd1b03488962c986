//! Track geometry sources.

mod procedural;

pub use procedural::{DriveConfig, DriveConfigError, DriveGenerator, SimulatedDrive};
