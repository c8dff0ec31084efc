pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod scheduler;
pub mod shift;
pub mod store;

pub use aggregate::{ProductivityAggregator, RangeRebuilder, Scope, UtilizationAggregator};
pub use config::Config;
pub use error::PlantError;
pub use shift::{ShiftAssigner, ShiftTable, WindowResolution};
pub use store::PlantStore;
