// Managers Module
//
// Focused managers owned by the engine, each handling one concern:
// - CalibrationManager: calibration window lifecycle and the active baseline
// - BroadcastChannelManager: tokio broadcast channel management

pub mod broadcast_manager;
pub mod calibration_manager;

pub use broadcast_manager::BroadcastChannelManager;
pub use calibration_manager::{CalibrationManager, CalibrationStep};
