//! Leveled, non-blocking logging.
//!
//! Producers hold an `Arc<dyn LogSink>` and log through the `sink_*!` macros;
//! the [`logger::Logger`] drains a bounded queue on its own thread.
pub mod log_level;
pub mod log_macros;
pub mod log_msg;
pub mod log_sink;
pub mod logger;
pub mod logger_handle;
pub use log_level::LogLevel;
pub use log_sink::{LogSink, MemoryLogSink, NoopLogSink};
