use std::{fmt, sync::Arc};

use crate::{
    capture::{
        audio_device::{AudioInput, AudioOutput, FixedChunkInput, NullOutput},
        capture_error::CaptureError,
        frame_source::{FrameSource, SyntheticSource},
    },
    config::{AudioConfig, VideoConfig},
};

type FrameSourceFactory =
    Arc<dyn Fn(&VideoConfig) -> Result<Box<dyn FrameSource>, CaptureError> + Send + Sync>;
type AudioInputFactory =
    Arc<dyn Fn(&AudioConfig) -> Result<Box<dyn AudioInput>, CaptureError> + Send + Sync>;
type AudioOutputFactory =
    Arc<dyn Fn(&AudioConfig) -> Result<Box<dyn AudioOutput>, CaptureError> + Send + Sync>;

/// Opens a fresh camera, microphone and speaker for every call.
///
/// Each call session owns its devices and releases them on stop, so the
/// bundle holds factories rather than open handles.
#[derive(Clone)]
pub struct MediaDevices {
    frame_source: FrameSourceFactory,
    audio_input: AudioInputFactory,
    audio_output: AudioOutputFactory,
}

impl fmt::Debug for MediaDevices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDevices").finish_non_exhaustive()
    }
}

impl MediaDevices {
    /// Test pattern at 30 fps, silent microphone, discarding speaker.
    #[must_use]
    pub fn synthetic() -> Self {
        Self {
            frame_source: Arc::new(|v: &VideoConfig| {
                Ok(Box::new(SyntheticSource::new(v.width, v.height, 30)) as Box<dyn FrameSource>)
            }),
            audio_input: Arc::new(|a: &AudioConfig| {
                Ok(Box::new(FixedChunkInput::silence(a)) as Box<dyn AudioInput>)
            }),
            audio_output: Arc::new(|_: &AudioConfig| {
                Ok(Box::new(NullOutput::default()) as Box<dyn AudioOutput>)
            }),
        }
    }

    /// Hardware devices for whatever the crate was compiled with; synthetic
    /// ones for the rest.
    #[must_use]
    pub fn from_features() -> Self {
        #[allow(unused_mut)]
        let mut devices = Self::synthetic();

        #[cfg(feature = "camera")]
        {
            devices = devices.with_frame_source(|v| {
                let cam = crate::capture::camera_source::CameraSource::open(0, v.width, v.height)?;
                Ok(Box::new(cam) as Box<dyn FrameSource>)
            });
        }

        #[cfg(feature = "audio-device")]
        {
            use crate::capture::cpal_audio::{CpalInput, CpalOutput};
            devices = devices
                .with_audio_input(|a| Ok(Box::new(CpalInput::open(a)?) as Box<dyn AudioInput>))
                .with_audio_output(|a| Ok(Box::new(CpalOutput::open(a)?) as Box<dyn AudioOutput>));
        }

        devices
    }

    #[must_use]
    pub fn with_frame_source<F>(mut self, f: F) -> Self
    where
        F: Fn(&VideoConfig) -> Result<Box<dyn FrameSource>, CaptureError> + Send + Sync + 'static,
    {
        self.frame_source = Arc::new(f);
        self
    }

    #[must_use]
    pub fn with_audio_input<F>(mut self, f: F) -> Self
    where
        F: Fn(&AudioConfig) -> Result<Box<dyn AudioInput>, CaptureError> + Send + Sync + 'static,
    {
        self.audio_input = Arc::new(f);
        self
    }

    #[must_use]
    pub fn with_audio_output<F>(mut self, f: F) -> Self
    where
        F: Fn(&AudioConfig) -> Result<Box<dyn AudioOutput>, CaptureError> + Send + Sync + 'static,
    {
        self.audio_output = Arc::new(f);
        self
    }

    pub fn open_frame_source(&self, cfg: &VideoConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
        (self.frame_source)(cfg)
    }

    pub fn open_audio_input(&self, cfg: &AudioConfig) -> Result<Box<dyn AudioInput>, CaptureError> {
        (self.audio_input)(cfg)
    }

    pub fn open_audio_output(
        &self,
        cfg: &AudioConfig,
    ) -> Result<Box<dyn AudioOutput>, CaptureError> {
        (self.audio_output)(cfg)
    }
}

impl Default for MediaDevices {
    fn default() -> Self {
        Self::synthetic()
    }
}
