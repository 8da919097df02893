//! Default microphone and speaker through CPAL.
//!
//! A `cpal::Stream` is not `Send`, so each device keeps its stream on a
//! dedicated thread that lives until `release()`. The media loop only sees
//! channel ends.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::{
    capture::{
        audio_device::{AudioInput, AudioOutput},
        capture_error::CaptureError,
    },
    config::AudioConfig,
    media::pcm,
};

/// Chunks queued for the speaker before the oldest is dropped.
const MAX_QUEUED_CHUNKS: usize = 4;

fn stream_config(cfg: &AudioConfig) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: cfg.channels,
        sample_rate: cpal::SampleRate(cfg.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn f32_to_i16(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

fn i16_to_f32(s: i16) -> f32 {
    f32::from(s) / f32::from(i16::MAX)
}

/// Spawns the thread that owns a stream and waits for the build result.
fn spawn_stream_thread<F>(
    name: &str,
    running: Arc<AtomicBool>,
    build: F,
) -> Result<JoinHandle<()>, CaptureError>
where
    F: FnOnce() -> Result<cpal::Stream, CaptureError> + Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();
    let device = name.to_owned();
    let handle = thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let stream = match build() {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(CaptureError::Open {
                    device: "audio stream".into(),
                    reason: e.to_string(),
                }));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            while running.load(Ordering::SeqCst) {
                thread::park_timeout(Duration::from_millis(100));
            }
            drop(stream);
        })
        .map_err(|e| CaptureError::Open {
            device: device.clone(),
            reason: e.to_string(),
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => Err(CaptureError::Open {
            device,
            reason: "stream thread exited".into(),
        }),
    }
}

pub struct CpalInput {
    rx: Receiver<Vec<i16>>,
    pending: Vec<i16>,
    samples_per_chunk: usize,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalInput {
    pub fn open(cfg: &AudioConfig) -> Result<Self, CaptureError> {
        let (tx, rx): (SyncSender<Vec<i16>>, _) = mpsc::sync_channel(64);
        let running = Arc::new(AtomicBool::new(true));
        let stream_cfg = stream_config(cfg);

        let thread = spawn_stream_thread("cpal-input", running.clone(), move || {
            let device = cpal::default_host()
                .default_input_device()
                .ok_or_else(|| CaptureError::Open {
                    device: "microphone".into(),
                    reason: "no default input device".into(),
                })?;
            device
                .build_input_stream(
                    &stream_cfg,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        // Full queue: drop rather than block the audio thread.
                        let _ = tx.try_send(data.iter().copied().map(f32_to_i16).collect());
                    },
                    |_err| {},
                    None,
                )
                .map_err(|e| CaptureError::Open {
                    device: "microphone".into(),
                    reason: e.to_string(),
                })
        })?;

        Ok(Self {
            rx,
            pending: Vec::new(),
            samples_per_chunk: cfg.chunk_frames * usize::from(cfg.channels),
            running,
            thread: Some(thread),
        })
    }
}

impl AudioInput for CpalInput {
    fn read_chunk(&mut self) -> Result<Vec<u8>, CaptureError> {
        if self.thread.is_none() {
            return Err(CaptureError::DeviceClosed);
        }
        while self.pending.len() < self.samples_per_chunk {
            match self.rx.recv_timeout(Duration::from_millis(200)) {
                Ok(samples) => self.pending.extend(samples),
                Err(RecvTimeoutError::Timeout) => return Err(CaptureError::NoFrame),
                Err(RecvTimeoutError::Disconnected) => return Err(CaptureError::DeviceClosed),
            }
        }
        let chunk: Vec<i16> = self.pending.drain(..self.samples_per_chunk).collect();
        Ok(pcm::samples_as_bytes(&chunk).to_vec())
    }

    fn release(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(t) = self.thread.take() {
            t.thread().unpark();
            let _ = t.join();
        }
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct CpalOutput {
    queue: Arc<Mutex<VecDeque<i16>>>,
    max_queued: usize,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    pub fn open(cfg: &AudioConfig) -> Result<Self, CaptureError> {
        let samples_per_chunk = cfg.chunk_frames * usize::from(cfg.channels);
        let max_queued = samples_per_chunk * MAX_QUEUED_CHUNKS;
        let queue = Arc::new(Mutex::new(VecDeque::with_capacity(max_queued)));
        let running = Arc::new(AtomicBool::new(true));
        let stream_cfg = stream_config(cfg);
        let cb_queue = queue.clone();

        let thread = spawn_stream_thread("cpal-output", running.clone(), move || {
            let device = cpal::default_host()
                .default_output_device()
                .ok_or_else(|| CaptureError::Open {
                    device: "speaker".into(),
                    reason: "no default output device".into(),
                })?;
            device
                .build_output_stream(
                    &stream_cfg,
                    move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let Ok(mut q) = cb_queue.lock() else {
                            out.fill(0.0);
                            return;
                        };
                        for sample in out.iter_mut() {
                            // Underrun plays silence.
                            *sample = q.pop_front().map_or(0.0, i16_to_f32);
                        }
                    },
                    |_err| {},
                    None,
                )
                .map_err(|e| CaptureError::Open {
                    device: "speaker".into(),
                    reason: e.to_string(),
                })
        })?;

        Ok(Self {
            queue,
            max_queued,
            running,
            thread: Some(thread),
        })
    }
}

impl AudioOutput for CpalOutput {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), CaptureError> {
        if self.thread.is_none() {
            return Err(CaptureError::DeviceClosed);
        }
        let samples = pcm::bytes_to_samples(chunk);
        let mut q = self
            .queue
            .lock()
            .map_err(|_| CaptureError::Device("output queue poisoned".into()))?;
        q.extend(samples);
        if q.len() > self.max_queued {
            let excess = q.len() - self.max_queued;
            q.drain(..excess);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(t) = self.thread.take() {
            t.thread().unpark();
            let _ = t.join();
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.release();
    }
}
