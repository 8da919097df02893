//! Webcam frames through OpenCV's `VideoCapture`.

use opencv::{
    core::{AlgorithmHint, CV_8UC3, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::{
    capture::{capture_error::CaptureError, frame_source::FrameSource},
    media::video_frame::VideoFrame,
};

pub struct CameraSource {
    cam: Option<VideoCapture>,
    device_id: i32,
}

impl CameraSource {
    /// Opens `device_id` and requests the given resolution. The driver may
    /// pick another one; frames carry the size actually delivered.
    pub fn open(device_id: i32, width: u32, height: u32) -> Result<Self, CaptureError> {
        let open_err = |reason: String| CaptureError::Open {
            device: format!("camera {device_id}"),
            reason,
        };

        let mut cam = VideoCapture::new(device_id, videoio::CAP_ANY)
            .map_err(|e| open_err(e.to_string()))?;
        if !cam.is_opened().unwrap_or(false) {
            return Err(open_err("device did not open".into()));
        }

        let _ = cam.set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(width));
        let _ = cam.set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(height));

        Ok(Self {
            cam: Some(cam),
            device_id,
        })
    }

    #[must_use]
    pub const fn device_id(&self) -> i32 {
        self.device_id
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        let Some(cam) = &mut self.cam else {
            return Err(CaptureError::DeviceClosed);
        };

        let mut bgr = Mat::default();
        if !cam.read(&mut bgr).unwrap_or(false) || bgr.empty() {
            return Err(CaptureError::NoFrame);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(
            &bgr,
            &mut rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(|e| CaptureError::Device(format!("cvtColor: {e}")))?;

        #[allow(clippy::cast_sign_loss)]
        let (w, h) = (rgb.cols().max(0) as u32, rgb.rows().max(0) as u32);
        let bytes = tight_rgb_bytes(&rgb)
            .map_err(|e| CaptureError::Device(format!("pack RGB: {e}")))?;

        Ok(VideoFrame::new(w, h, bytes))
    }

    fn release(&mut self) {
        if let Some(mut cam) = self.cam.take() {
            let _ = cam.release();
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Tightly packed RGB (len = cols*rows*3), whatever the row stride.
#[allow(clippy::cast_sign_loss)]
fn tight_rgb_bytes(mat: &Mat) -> opencv::Result<Vec<u8>> {
    if mat.typ() != CV_8UC3 {
        let mut fixed = Mat::default();
        mat.convert_to(&mut fixed, CV_8UC3, 1.0, 0.0)?;
        return tight_rgb_bytes(&fixed);
    }

    let cols = mat.cols() as usize;
    let rows = mat.rows() as usize;
    let row_bytes = cols * 3;

    if mat.is_continuous() {
        return Ok(mat.data_bytes()?.to_vec());
    }

    let mut out = Vec::with_capacity(rows * row_bytes);
    for r in 0..rows {
        let row = mat.row(r as i32)?;
        let row = row.try_clone()?;
        out.extend_from_slice(&row.data_bytes()?[..row_bytes]);
    }
    Ok(out)
}
