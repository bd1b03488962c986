//! Test data generation for track-device.
//!
//! Produces reproducible synthetic vehicle drives with the faults real GPS
//! devices exhibit, for property tests and for manual checks of the HTTP API.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//! use rand::{SeedableRng, rngs::StdRng};
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let drive = DriveGenerator::new(DriveConfig::default(), 7)?.generate(&mut rng);
//! let fixes = anomalies::inject(drive.fixes.clone(), &AnomalyConfig::default(), &mut rng);
//! let json = TripFile::new("trip-7", &drive, &fixes).to_json()?;
//! ```

pub mod anomalies;
pub mod config;
pub mod sources;
pub mod terrain;
pub mod trip_file;

pub use track_device::Fix;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::anomalies::{self, AnomalyConfig};
    pub use crate::config::{BoundingBox, Region};
    pub use crate::sources::{DriveConfig, DriveGenerator, SimulatedDrive};
    pub use crate::terrain::ElevationGenerator;
    pub use crate::trip_file::TripFile;
    pub use crate::Fix;
}
