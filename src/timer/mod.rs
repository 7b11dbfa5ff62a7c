pub mod commands;
pub mod service;
pub mod state;

pub use service::TrackerService;
