//! Work-session time tracking.
//!
//! A user starts a session, pauses and resumes it any number of times, and
//! finishes it with a subject. Worked time is never accumulated by a ticking
//! process: it is recomputed from `started_at` and the recorded pause
//! intervals, so a client that reloads can always resync from
//! [`TrackerService::get_active_session`].

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;
pub mod timer;
pub mod utils;

use anyhow::Result;
use log::info;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use db::Database;
pub use error::{TrackerError, TrackerResult};
pub use models::{PauseInterval, SessionInfo, SessionStatus, WorkSession, WorkSummary};
pub use store::{MemorySessionStore, SessionFilter, SessionStore, StoreError};
pub use timer::TrackerService;

/// Installs the logger (if none is set yet), opens the SQLite store named by
/// `config` and wires a tracker on the system clock.
pub fn open_tracker(config: &TrackerConfig) -> Result<TrackerService<Database, SystemClock>> {
    utils::init_logging(&config.log_level);

    let database = Database::new(config.database_path.clone())?;
    info!(
        "Work tracker ready (subject limit {}, page size {}/{})",
        config.max_subject_len, config.default_page_size, config.max_page_size
    );
    Ok(TrackerService::with_config(
        database,
        SystemClock,
        config.clone(),
    ))
}
