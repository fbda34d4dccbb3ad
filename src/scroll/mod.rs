//! Scroll-based distributed pagination engine
//!
//! Large raw-data exports are partitioned into `slice_max` independently
//! cursored slices, scrolled round by round: each HTTP call executes one
//! round over every currently eligible slice, and the caller keeps calling
//! until the engine reports `done`.
//!
//! The moving parts:
//!
//! - [`status`]: per-slice status records and the pure retry policy
//!   (pending → stop after the failure ceiling, pending → completed on
//!   exhaustion; both terminal).
//! - [`session`]: the per-(query, user) session that owns slice allocation,
//!   cursor rotation, and completion detection, persisted in the shared
//!   status store with scroll-window TTLs.
//! - [`orchestrator`]: one round's fan-out/fan-in over the backend drivers.

pub mod error;
pub mod orchestrator;
pub mod session;
pub mod status;

pub use error::{ScrollError, ScrollResult};
pub use orchestrator::{
    option_key, ResultTableOption, ResultTableOptions, RoundResult, ScrollConfig,
    ScrollOrchestrator, SessionInfo,
};
pub use session::{
    derive_session_key, lock_key, ScrollSession, SessionMeta, Slice, SESSION_KEY_PREFIX,
    SESSION_LOCK_PREFIX,
};
pub use status::{
    advance, SliceAddr, SliceOutcome, SliceState, SliceStatus, DEFAULT_FAILURE_CEILING,
};
