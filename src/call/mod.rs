//! A call's lifetime: session start and teardown, its worker threads, and
//! the directory of active calls.
pub mod call_error;
pub mod directory;
pub mod session;
pub mod supervisor;

pub use call_error::CallError;
pub use directory::CallDirectory;
pub use session::{CallSession, EndReason, SessionContext};
pub use supervisor::WorkerSet;
