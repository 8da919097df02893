use std::{
    thread,
    time::{Duration, Instant},
};

use crate::{
    capture::capture_error::CaptureError,
    media::video_frame::VideoFrame,
};

/// Blocking producer of raw frames for the video sender loop.
pub trait FrameSource: Send {
    /// Waits for the next frame. Implementations bound the wait so the caller
    /// can observe its stop flag.
    fn next_frame(&mut self) -> Result<VideoFrame, CaptureError>;

    /// Frees the device. Later reads return `DeviceClosed`.
    fn release(&mut self);
}

/// Test-pattern camera paced at a fixed frame rate.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    period: Duration,
    next_deadline: Instant,
    tick: u8,
    released: bool,
}

impl SyntheticSource {
    #[must_use]
    pub fn new(width: u32, height: u32, target_fps: u32) -> Self {
        let fps = target_fps.clamp(1, 120);
        let period = Duration::from_millis(1_000 / u64::from(fps));
        Self {
            width,
            height,
            period,
            next_deadline: Instant::now(),
            tick: 0,
            released: false,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        if self.released {
            return Err(CaptureError::DeviceClosed);
        }

        let now = Instant::now();
        if now < self.next_deadline {
            thread::sleep(self.next_deadline - now);
            self.next_deadline += self.period;
        } else {
            self.next_deadline = now + self.period;
        }

        let frame = VideoFrame::synthetic(self.width, self.height, self.tick);
        self.tick = self.tick.wrapping_add(1);
        Ok(frame)
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn frames_change_between_ticks_and_stop_after_release() {
        let mut src = SyntheticSource::new(16, 8, 120);
        let a = src.next_frame().unwrap();
        let b = src.next_frame().unwrap();
        assert!(a.is_well_formed());
        assert_ne!(a.bytes, b.bytes);

        src.release();
        assert!(matches!(src.next_frame(), Err(CaptureError::DeviceClosed)));
    }
}
