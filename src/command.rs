use std::path::Path;

use crate::aom_encoder::AomGoodCommand;
use crate::libvpx_encoder::LibvpxRtCommand;
use crate::openh264_encoder::OpenH264Command;
use crate::tools::ToolLocator;
use crate::yami_encoder::YamiCommand;
use crate::{Codec, CommandSpec, ConfigError, EncoderKind, Job, LayerConfig};

/// Argument contract for one encoder family.
///
/// `build` returns a command whose `program` is relative to the tool root; callers
/// resolve it with [`ToolLocator`] before spawning.
pub trait EncoderCommand: Send + Sync {
    fn kind(&self) -> EncoderKind;

    fn supported_codecs(&self) -> &'static [Codec];

    fn max_temporal_layers(&self) -> u32 {
        1
    }

    /// Binary invoked for the given layering.
    fn binary(&self, layers: LayerConfig) -> &'static str;

    fn build(&self, job: &Job, work_dir: &Path) -> Result<CommandSpec, ConfigError>;

    fn check(&self, codec: Codec, layers: LayerConfig) -> Result<(), ConfigError> {
        if !self.supported_codecs().contains(&codec) {
            return Err(ConfigError::UnsupportedCodec {
                encoder: self.kind(),
                codec,
            });
        }
        if layers.spatial != 1 || layers.temporal == 0 || layers.temporal > self.max_temporal_layers()
        {
            return Err(ConfigError::UnsupportedLayers {
                encoder: self.kind(),
                spatial: layers.spatial,
                temporal: layers.temporal,
            });
        }
        Ok(())
    }
}

impl EncoderKind {
    pub fn command(self) -> &'static dyn EncoderCommand {
        match self {
            Self::AomGood => &AomGoodCommand,
            Self::LibvpxRt => &LibvpxRtCommand,
            Self::OpenH264 => &OpenH264Command,
            Self::Yami => &YamiCommand,
        }
    }
}

/// Builds the job's command and resolves its binary.
pub fn prepare_command(
    job: &Job,
    work_dir: &Path,
    tools: &ToolLocator,
) -> Result<CommandSpec, ConfigError> {
    let builder = job.encoder.command();
    builder.check(job.codec, job.layers)?;
    let mut spec = builder.build(job, work_dir)?;
    spec.program = tools.resolve(builder.binary(job.layers))?;
    Ok(spec)
}

/// Nominal (single layer) target bitrate; every single-layer variant uses it.
pub(crate) fn single_layer_kbps(job: &Job) -> u32 {
    job.target_bitrates_kbps.first().copied().unwrap_or(0)
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
