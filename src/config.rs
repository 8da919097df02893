//! INI-style configuration file and the typed views the call stack reads.
//!
//! ```text
//! # lanchat.conf
//! [Network]
//! signaling_port = 5000
//! video_port = 5001
//!
//! [Video]
//! wire_format = sequenced
//! ```

use std::collections::HashMap;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid value for [{section}] {key}: {value:?}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

#[derive(Debug)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Parses configuration text. Unknown lines are skipped.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut globals = HashMap::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = &line[1..line.len() - 1];
                current_section = Some(name.trim().to_string());
                continue;
            }

            if let Some(pos) = line.find('=') {
                let key = line[..pos].trim().to_string();
                let value = line[pos + 1..].trim().trim_matches('"').to_string();

                match &current_section {
                    None => {
                        globals.insert(key, value);
                    }
                    Some(sec) => {
                        sections.entry(sec.clone()).or_default().insert(key, value);
                    }
                }
            }
        }
        Config { globals, sections }
    }

    pub fn empty() -> Self {
        Self {
            globals: HashMap::new(),
            sections: HashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_or_default<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get(section, key)
            .or_else(|| self.get_global(key))
            .unwrap_or(default)
    }

    /// Parsed lookup that silently falls back to `default` on a missing or
    /// malformed value. Use [`Config::parse_strict`] to surface the latter.
    #[must_use]
    pub fn get_parsed_or<T: FromStr>(&self, section: &str, key: &str, default: T) -> T {
        self.get_non_empty(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_strict<T: FromStr>(&self, section: &str, key: &str) -> Result<(), ConfigError> {
        match self.get_non_empty(section, key) {
            Some(v) if v.parse::<T>().is_err() => Err(ConfigError::InvalidValue {
                section: section.to_owned(),
                key: key.to_owned(),
                value: v.to_owned(),
            }),
            _ => Ok(()),
        }
    }

    /// Reports the first malformed value among the keys the call stack reads.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in [
            "signaling_port",
            "video_port",
            "audio_port",
            "discovery_port",
            "remote_video_port",
            "remote_audio_port",
        ] {
            self.parse_strict::<u16>("Network", key)?;
        }
        for key in ["connect_timeout_ms", "response_timeout_ms", "recv_timeout_ms"] {
            self.parse_strict::<u64>("Network", key)?;
        }
        for key in ["max_datagram", "width", "height", "frame_pacing_ms"] {
            self.parse_strict::<u32>("Video", key)?;
        }
        self.parse_strict::<u8>("Video", "jpeg_quality")?;
        self.parse_strict::<WireFormat>("Video", "wire_format")?;
        for key in ["sample_rate", "chunk_frames", "pacing_us"] {
            self.parse_strict::<u32>("Audio", key)?;
        }
        self.parse_strict::<u16>("Audio", "channels")?;
        Ok(())
    }
}

// ---- Typed views ----------------------------------------------------------

/// Largest UDP payload that fits an IPv4 datagram.
pub const MAX_SAFE_DATAGRAM: usize = 65_507;

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub signaling_port: u16,
    pub video_port: u16,
    pub audio_port: u16,
    pub discovery_port: u16,
    /// Ports the media senders target on the peer.
    pub remote_video_port: u16,
    pub remote_audio_port: u16,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    /// Datagram/stream read timeout; bounds how long a loop waits before
    /// re-checking its running flag.
    pub recv_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            signaling_port: 5000,
            video_port: 5001,
            audio_port: 5002,
            discovery_port: 5003,
            remote_video_port: 5001,
            remote_audio_port: 5002,
            connect_timeout: Duration::from_millis(3_000),
            response_timeout: Duration::from_millis(30_000),
            recv_timeout: Duration::from_millis(200),
        }
    }
}

impl NetworkConfig {
    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        let d = Self::default();
        let video_port = cfg.get_parsed_or("Network", "video_port", d.video_port);
        let audio_port = cfg.get_parsed_or("Network", "audio_port", d.audio_port);
        Self {
            signaling_port: cfg.get_parsed_or("Network", "signaling_port", d.signaling_port),
            video_port,
            audio_port,
            discovery_port: cfg.get_parsed_or("Network", "discovery_port", d.discovery_port),
            remote_video_port: cfg.get_parsed_or("Network", "remote_video_port", video_port),
            remote_audio_port: cfg.get_parsed_or("Network", "remote_audio_port", audio_port),
            connect_timeout: Duration::from_millis(cfg.get_parsed_or(
                "Network",
                "connect_timeout_ms",
                3_000,
            )),
            response_timeout: Duration::from_millis(cfg.get_parsed_or(
                "Network",
                "response_timeout_ms",
                30_000,
            )),
            recv_timeout: Duration::from_millis(
                cfg.get_parsed_or("Network", "recv_timeout_ms", 200u64).max(1),
            ),
        }
    }
}

/// How encoded frames are cut into datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Raw chunks; a chunk shorter than the datagram limit ends a frame.
    #[default]
    Legacy,
    /// Every chunk carries frame id, index and count.
    Sequenced,
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "sequenced" => Ok(Self::Sequenced),
            other => Err(format!("unknown wire format {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Maximum datagram payload, `M`.
    pub max_datagram: usize,
    pub jpeg_quality: u8,
    pub width: u32,
    pub height: u32,
    /// Pause after each fully sent frame.
    pub frame_pacing: Duration,
    pub wire_format: WireFormat,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_datagram: MAX_SAFE_DATAGRAM,
            jpeg_quality: 80,
            width: 640,
            height: 480,
            frame_pacing: Duration::from_millis(10),
            wire_format: WireFormat::Legacy,
        }
    }
}

impl VideoConfig {
    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        let d = Self::default();
        Self {
            max_datagram: cfg
                .get_parsed_or("Video", "max_datagram", d.max_datagram)
                .clamp(64, MAX_SAFE_DATAGRAM),
            jpeg_quality: cfg
                .get_parsed_or("Video", "jpeg_quality", d.jpeg_quality)
                .clamp(1, 100),
            width: cfg.get_parsed_or("Video", "width", d.width).max(1),
            height: cfg.get_parsed_or("Video", "height", d.height).max(1),
            frame_pacing: Duration::from_millis(cfg.get_parsed_or(
                "Video",
                "frame_pacing_ms",
                10,
            )),
            wire_format: cfg.get_parsed_or("Video", "wire_format", d.wire_format),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Sample frames per datagram.
    pub chunk_frames: usize,
    pub bytes_per_sample: usize,
    pub pacing: Duration,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            chunk_frames: 1024,
            bytes_per_sample: 2,
            pacing: Duration::from_micros(1_000),
        }
    }
}

impl AudioConfig {
    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        let d = Self::default();
        Self {
            sample_rate: cfg.get_parsed_or("Audio", "sample_rate", d.sample_rate).max(1),
            channels: cfg.get_parsed_or("Audio", "channels", d.channels).clamp(1, 8),
            chunk_frames: cfg.get_parsed_or("Audio", "chunk_frames", d.chunk_frames).max(1),
            bytes_per_sample: d.bytes_per_sample,
            pacing: Duration::from_micros(cfg.get_parsed_or("Audio", "pacing_us", 1_000)),
        }
    }

    /// Bytes in one datagram: frames per buffer x channels x bytes per sample.
    #[must_use]
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_frames * usize::from(self.channels) * self.bytes_per_sample
    }

    /// Wall-clock length of one chunk.
    #[must_use]
    pub fn chunk_duration(&self) -> Duration {
        let micros = (self.chunk_frames as u64 * 1_000_000) / u64::from(self.sample_rate);
        Duration::from_micros(micros)
    }
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub display_name: String,
}

impl IdentityConfig {
    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        let display_name = cfg
            .get_non_empty("Identity", "display_name")
            .map(str::to_owned)
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
            .unwrap_or_else(|| "lanchat".to_owned());
        Self { display_name }
    }
}

/// Everything a node needs to run calls.
#[derive(Debug, Clone, Default)]
pub struct CallConfig {
    pub network: NetworkConfig,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub identity: IdentityConfig,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            display_name: "lanchat".to_owned(),
        }
    }
}

impl CallConfig {
    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            network: NetworkConfig::from_config(cfg),
            video: VideoConfig::from_config(cfg),
            audio: AudioConfig::from_config(cfg),
            identity: IdentityConfig::from_config(cfg),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    const SAMPLE: &str = r#"
# comment
display = "top"

[Network]
signaling_port = 6000
video_port = 6001
recv_timeout_ms = 50

[Video]
max_datagram = 1200
wire_format = Sequenced

[Audio]
chunk_frames = 512
channels = 2
"#;

    #[test]
    fn parses_sections_and_globals() {
        let cfg = Config::parse(SAMPLE);
        assert_eq!(cfg.get_global("display"), Some("top"));
        assert_eq!(cfg.get("Network", "signaling_port"), Some("6000"));
        assert_eq!(cfg.get("Network", "missing"), None);
        assert_eq!(cfg.get_or_default("Video", "display", "x"), "top");
    }

    #[test]
    fn typed_views_apply_overrides_and_defaults() {
        let cfg = CallConfig::from_config(&Config::parse(SAMPLE));
        assert_eq!(cfg.network.signaling_port, 6000);
        assert_eq!(cfg.network.video_port, 6001);
        // Remote ports follow local ports unless set.
        assert_eq!(cfg.network.remote_video_port, 6001);
        assert_eq!(cfg.network.audio_port, 5002);
        assert_eq!(cfg.network.recv_timeout, Duration::from_millis(50));
        assert_eq!(cfg.video.max_datagram, 1200);
        assert_eq!(cfg.video.wire_format, WireFormat::Sequenced);
        assert_eq!(cfg.video.jpeg_quality, 80);
        assert_eq!(cfg.audio.chunk_bytes(), 512 * 2 * 2);
    }

    #[test]
    fn empty_config_matches_defaults() {
        let cfg = CallConfig::from_config(&Config::empty());
        assert_eq!(cfg.video.max_datagram, MAX_SAFE_DATAGRAM);
        assert_eq!(cfg.audio.chunk_bytes(), 2048);
        assert_eq!(cfg.network.discovery_port, 5003);
    }

    #[test]
    fn validate_reports_malformed_value() {
        let cfg = Config::parse("[Network]\nvideo_port = abc\n");
        match cfg.validate() {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "video_port"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
        // The lenient view still falls back to the default.
        assert_eq!(NetworkConfig::from_config(&cfg).video_port, 5001);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        assert!(matches!(
            Config::load("/definitely/not/here.conf"),
            Err(ConfigError::Read { .. })
        ));
    }
}
