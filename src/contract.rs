use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::Arc;
use std::{fmt, fmt::Display};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Codec {
    Vp8,
    Vp9,
    Av1,
    H264,
}

impl Codec {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vp8 => "vp8",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
            Self::H264 => "h264",
        }
    }

    /// Decoder binary, relative to the tool root.
    pub fn decoder_binary(self) -> &'static str {
        match self {
            Self::Av1 => "aom/aomdec",
            Self::Vp8 | Self::Vp9 => "libvpx/vpxdec",
            Self::H264 => "openh264/h264dec",
        }
    }

    pub fn decoder_writes_framestats(self) -> bool {
        !matches!(self, Self::H264)
    }
}

impl Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = ConfigError;

    fn from_str(v: &str) -> Result<Self, Self::Err> {
        match v.to_ascii_lowercase().as_str() {
            "vp8" => Ok(Self::Vp8),
            "vp9" => Ok(Self::Vp9),
            "av1" => Ok(Self::Av1),
            "h264" | "avc" => Ok(Self::H264),
            _ => Err(ConfigError::UnknownCodec(v.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EncoderKind {
    AomGood,
    LibvpxRt,
    OpenH264,
    Yami,
}

impl EncoderKind {
    pub const ALL: [EncoderKind; 4] = [Self::AomGood, Self::LibvpxRt, Self::OpenH264, Self::Yami];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AomGood => "aom-good",
            Self::LibvpxRt => "libvpx-rt",
            Self::OpenH264 => "openh264",
            Self::Yami => "yami",
        }
    }
}

impl Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncoderKind {
    type Err = ConfigError;

    fn from_str(v: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == v)
            .ok_or_else(|| ConfigError::UnknownEncoder(v.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncoderPair {
    pub encoder: EncoderKind,
    pub codec: Codec,
}

impl EncoderPair {
    /// Parses a comma separated `encoder:codec,encoder:codec` list.
    pub fn parse_list(v: &str) -> Result<Vec<Self>, ConfigError> {
        v.split(',').map(str::parse).collect()
    }
}

impl FromStr for EncoderPair {
    type Err = ConfigError;

    fn from_str(v: &str) -> Result<Self, Self::Err> {
        let Some((encoder, codec)) = v.trim().split_once(':') else {
            return Err(ConfigError::InvalidEncoderPair(v.to_owned()));
        };
        if encoder.is_empty() || codec.is_empty() {
            return Err(ConfigError::InvalidEncoderPair(v.to_owned()));
        }
        Ok(Self {
            encoder: encoder.parse()?,
            codec: codec.parse()?,
        })
    }
}

impl Display for EncoderPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.encoder, self.codec)
    }
}

pub const MAX_TEMPORAL_LAYERS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerConfig {
    pub spatial: u32,
    pub temporal: u32,
}

impl LayerConfig {
    pub fn new(spatial: u32, temporal: u32) -> Result<Self, ConfigError> {
        let layers = Self { spatial, temporal };
        layers.validate()?;
        Ok(layers)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spatial != 1 {
            return Err(ConfigError::InvalidLayers(format!(
                "{} spatial layers requested, only 1 is supported",
                self.spatial
            )));
        }
        if !(1..=MAX_TEMPORAL_LAYERS).contains(&self.temporal) {
            return Err(ConfigError::InvalidLayers(format!(
                "{} temporal layers requested, expected 1-{MAX_TEMPORAL_LAYERS}",
                self.temporal
            )));
        }
        Ok(())
    }

    /// `<S>sl<T>tl`, the grouping key used downstream.
    pub fn pattern(&self) -> String {
        format!("{}sl{}tl", self.spatial, self.temporal)
    }

    pub fn layer_count(&self) -> u32 {
        self.spatial * self.temporal
    }
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            spatial: 1,
            temporal: 1,
        }
    }
}

/// A prepared source clip. `yuv_path` is the raw I420 stream handed to encoders,
/// which may be a converted or truncated copy of `input_path`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub input_path: PathBuf,
    pub yuv_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub sha256: String,
    pub total_frames: u64,
    pub frame_offset: u64,
    pub frames: u64,
}

impl Clip {
    pub fn file_name(&self) -> String {
        file_name_lossy(&self.input_path)
    }

    pub fn stem(&self) -> String {
        self.input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn rounded_fps(&self) -> u32 {
        (self.fps + 0.5) as u32
    }

    pub fn target_encode_ms(&self) -> f64 {
        self.frames as f64 * 1000.0 / self.fps
    }
}

pub fn i420_frame_size(width: u32, height: u32) -> u64 {
    u64::from(width) * u64::from(height) * 3 / 2
}

fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[derive(Debug, Clone)]
pub struct Job {
    pub encoder: EncoderKind,
    pub codec: Codec,
    pub clip: Arc<Clip>,
    pub target_bitrates_kbps: Vec<u32>,
    pub layers: LayerConfig,
}

impl Job {
    pub fn new(
        pair: EncoderPair,
        clip: Arc<Clip>,
        target_bitrates_kbps: Vec<u32>,
        layers: LayerConfig,
    ) -> Result<Self, ConfigError> {
        if target_bitrates_kbps.len() != layers.temporal as usize {
            return Err(ConfigError::InvalidLadder(format!(
                "{} bitrates for {} temporal layers",
                target_bitrates_kbps.len(),
                layers.temporal
            )));
        }
        if target_bitrates_kbps.windows(2).any(|w| w[0] > w[1]) {
            return Err(ConfigError::InvalidLadder(format!(
                "bitrates must be non-decreasing: {target_bitrates_kbps:?}"
            )));
        }
        Ok(Self {
            encoder: pair.encoder,
            codec: pair.codec,
            clip,
            target_bitrates_kbps,
            layers,
        })
    }

    pub fn pair(&self) -> EncoderPair {
        EncoderPair {
            encoder: self.encoder,
            codec: self.codec,
        }
    }

    pub fn nominal_bitrate_kbps(&self) -> u32 {
        self.target_bitrates_kbps.last().copied().unwrap_or(0)
    }

    pub fn bitrate_config(&self) -> String {
        self.target_bitrates_kbps
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} {} {}",
            self.encoder,
            self.codec,
            self.layers.pattern(),
            self.bitrate_config(),
            self.clip.file_name()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    pub path: PathBuf,
    pub spatial_layer: u32,
    pub temporal_layer: u32,
}

impl EncodedArtifact {
    pub fn new(path: PathBuf, spatial_layer: u32, temporal_layer: u32) -> Self {
        Self {
            path,
            spatial_layer,
            temporal_layer,
        }
    }

    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub artifacts: Vec<EncodedArtifact>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.args.extend(args.into_iter().map(|a| a.to_string()));
        self
    }

    pub fn artifact(mut self, artifact: EncodedArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
