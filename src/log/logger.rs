use crate::{
    config::Config,
    log::{log_level::LogLevel, log_msg::LogMsg, logger_handle::LoggerHandle},
};

use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, TrySendError},
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

/// Flush to disk every 100 lines if debugging/tracing (to see crashes near real-time).
#[cfg(feature = "log-debug")]
const FLUSH_BATCH_SIZE: u32 = 100;

/// Flush to disk every 1000 lines in production/default (to save I/O & CPU).
#[cfg(not(feature = "log-debug"))]
const FLUSH_BATCH_SIZE: u32 = 1_000;

const DEFAULT_APP_NAME: &str = "lanchat";

/// Bounded, non-blocking logger that writes to a per-process log file.
///
/// 1. **Producers**: media loops and signaling threads log through a
///    [`LoggerHandle`].
/// 2. **Queue**: a bounded `mpsc` channel absorbs bursts.
/// 3. **Consumer**: the `logger-worker` thread writes lines and flushes
///    every `FLUSH_BATCH_SIZE` lines.
/// 4. **Sampler**: Warn/Error lines and one in `sample_every` of the others
///    are forwarded to a status channel for the terminal front end.
///
/// The worker exits once every handle is dropped; the file is flushed then.
pub struct Logger {
    handle: LoggerHandle,
    ui_log_rx: mpsc::Receiver<String>,
    _thread: Option<thread::JoinHandle<()>>,
    file_path: PathBuf,
}

impl Logger {
    /// Starts the logger from the `[Logging]` section: `log_path` (directory,
    /// `~` expanded) and `log_filename` (file prefix).
    #[must_use]
    pub fn from_config(cap: usize, ui_cap: usize, sample_every: u32, config: &Config) -> Self {
        let app_name = config
            .get_non_empty("Logging", "log_filename")
            .unwrap_or(DEFAULT_APP_NAME);

        let dir = config
            .get_non_empty("Logging", "log_path")
            .map_or_else(|| exe_dir_fallback_cwd().join("logs"), expand_path);

        Self::start_in_dir(dir, Some(app_name), cap, ui_cap, sample_every)
    }

    /// Creates the directory if needed and starts the worker writing to
    /// `<dir>/<app>-<YYYYMMDD_HHMMSS>-pid<pid>.log`.
    pub fn start_in_dir<D: AsRef<Path>>(
        dir: D,
        app_name: Option<&str>,
        cap: usize,
        ui_cap: usize,
        sample_every: u32,
    ) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let _ = fs::create_dir_all(&dir);

        let sample_every = sample_every.max(1);
        let ts = timestamp_for_filename();
        let pid = std::process::id();

        let fname = match app_name {
            Some(name) => format!("{name}-{ts}-pid{pid}.log"),
            None => format!("{ts}-pid{pid}.log"),
        };
        let file_path = dir.join(fname);

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap.max(1));
        let (ui_tx, ui_rx) = mpsc::sync_channel::<String>(ui_cap.max(1));

        let worker_path = file_path.clone();
        let _thread = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || run_worker(&worker_path, &rx, &ui_tx, sample_every))
            .ok();

        Self {
            handle: LoggerHandle { tx },
            ui_log_rx: ui_rx,
            _thread,
            file_path,
        }
    }

    /// Enqueues a message without blocking; drops it when the queue is full.
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), TrySendError<LogMsg>> {
        self.handle.try_log(level, text, target)
    }

    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    /// One sampled line for the status display, if any.
    #[must_use]
    pub fn try_recv_ui(&self) -> Option<String> {
        self.ui_log_rx.try_recv().ok()
    }

    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn run_worker(
    path: &Path,
    rx: &mpsc::Receiver<LogMsg>,
    ui_tx: &mpsc::SyncSender<String>,
    sample_every: u32,
) {
    // Target file -> temp file -> sink; never panic.
    let writer: Box<dyn Write + Send> =
        if let Ok(f) = OpenOptions::new().create(true).append(true).open(path) {
            Box::new(f)
        } else {
            let fallback = std::env::temp_dir().join("lanchat-fallback.log");
            match OpenOptions::new().create(true).append(true).open(&fallback) {
                Ok(f) => Box::new(f),
                Err(_) => Box::new(io::sink()),
            }
        };
    let mut out = BufWriter::new(writer);

    let mut n: u32 = 0;
    let mut lines_written: u32 = 0;
    let mut dropped_to_ui: usize = 0;

    while let Ok(m) = rx.recv() {
        let _ = writeln!(&mut out, "{}", m.file_line());
        lines_written = lines_written.wrapping_add(1);
        if lines_written.is_multiple_of(FLUSH_BATCH_SIZE) {
            let _ = out.flush();
        }

        let forward = m.level >= LogLevel::Warn || {
            n = n.wrapping_add(1);
            n.is_multiple_of(sample_every)
        };

        if forward && ui_tx.try_send(format!("[{}] {}", m.level, m.text)).is_err() {
            dropped_to_ui += 1;
        }

        if dropped_to_ui >= 10 {
            let _ = ui_tx.try_send(format!(
                "(logger) status queue dropped {dropped_to_ui} lines"
            ));
            dropped_to_ui = 0;
        }
    }

    let _ = out.flush();
}

fn exe_dir_fallback_cwd() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// `YYYYMMDD_HHMMSS` in UTC.
fn timestamp_for_filename() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    unix_to_utc(secs).map_or_else(
        |_| format!("unix_{secs}"),
        |tm| {
            format!(
                "{:04}{:02}{:02}_{:02}{:02}{:02}",
                tm.year, tm.mon, tm.day, tm.hour, tm.min, tm.sec
            )
        },
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SimpleUtc {
    year: i32,
    mon: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
}

#[derive(Debug)]
enum UtcConvError {
    Year,
    Month,
    Day,
}

/// Civil-from-days conversion of a UNIX timestamp.
#[allow(clippy::many_single_char_names, clippy::cast_possible_truncation)]
fn unix_to_utc(mut s: u64) -> Result<SimpleUtc, UtcConvError> {
    let sec = (s % 60) as u32;
    s /= 60;
    let min = (s % 60) as u32;
    s /= 60;
    let hour = (s % 24) as u32;
    s /= 24;

    let z: i128 = i128::from(s) + 719_468;

    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = doy - (153 * mp + 2) / 5 + 1; // [1, 31]
    let m = mp + if mp < 10 { 3 } else { -9 }; // [1, 12]

    let year = i32::try_from(y + i128::from(m <= 2)).map_err(|_| UtcConvError::Year)?;
    let mon = u32::try_from(m).map_err(|_| UtcConvError::Month)?;
    let day = u32::try_from(d).map_err(|_| UtcConvError::Day)?;

    Ok(SimpleUtc {
        year,
        mon,
        day,
        hour,
        min,
        sec,
    })
}

/// Expands a leading `~` to the user's home directory.
fn expand_path(path_str: &str) -> PathBuf {
    if let Some(rest) = path_str.strip_prefix('~') {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from);

        if let Some(mut home_path) = home {
            if rest.is_empty() {
                return home_path;
            }
            if let Some(tail) = rest.strip_prefix('/').or_else(|| rest.strip_prefix('\\')) {
                home_path.push(tail);
                return home_path;
            }
        }
    }
    PathBuf::from(path_str)
}
