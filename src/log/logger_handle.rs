use std::sync::mpsc;

use crate::{
    log::{log_level::LogLevel, log_msg::LogMsg, log_sink::LogSink},
    media::utils::now_millis,
};

/// Cloneable, non-blocking producer side of the [`Logger`](super::logger::Logger).
///
/// Every media loop holds one of these behind an `Arc<dyn LogSink>`. A full
/// queue drops the message instead of stalling the loop.
#[derive(Clone)]
pub struct LoggerHandle {
    pub(super) tx: mpsc::SyncSender<LogMsg>,
}

impl LogSink for LoggerHandle {
    #[inline]
    fn log(&self, level: LogLevel, msg: &str, target: &'static str) {
        let _ = self.try_log(level, msg, target);
    }
}

impl LoggerHandle {
    /// Enqueues a message stamped with the current time.
    ///
    /// # Errors
    /// `TrySendError::Full` when the queue is at capacity and
    /// `TrySendError::Disconnected` once the logger worker has exited.
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), mpsc::TrySendError<LogMsg>> {
        self.tx
            .try_send(LogMsg::new(level, text, target, now_millis()))
    }
}
