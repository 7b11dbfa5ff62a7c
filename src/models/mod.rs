pub mod pause;
pub mod session;

pub use pause::PauseInterval;
pub use session::{SessionAction, SessionInfo, SessionStatus, WorkSession, WorkSummary};
