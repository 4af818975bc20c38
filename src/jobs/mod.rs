pub mod maintenance;

pub use maintenance::{MaintenanceJob, MaintenanceJobConfig, MaintenanceKind, MaintenanceStats};
