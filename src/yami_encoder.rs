use std::path::Path;

use crate::command::{EncoderCommand, path_arg, single_layer_kbps};
use crate::{Codec, CommandSpec, ConfigError, EncodedArtifact, EncoderKind, Job, LayerConfig};

#[derive(Debug, Clone, Copy)]
pub struct YamiCommand;

impl EncoderCommand for YamiCommand {
    fn kind(&self) -> EncoderKind {
        EncoderKind::Yami
    }

    fn supported_codecs(&self) -> &'static [Codec] {
        &[Codec::Vp8, Codec::Vp9, Codec::H264]
    }

    fn binary(&self, _layers: LayerConfig) -> &'static str {
        "yami/libyami/bin/yamiencode"
    }

    fn build(&self, job: &Job, work_dir: &Path) -> Result<CommandSpec, ConfigError> {
        self.check(job.codec, job.layers)?;
        let clip = &job.clip;
        let output = work_dir.join("encoded.ivf");

        Ok(CommandSpec::new(self.binary(job.layers))
            .args(["--rcmode", "CBR", "--ipperiod", "1", "--intraperiod", "3000"])
            .arg("-c")
            .arg(job.codec.as_str().to_ascii_uppercase())
            .arg("-i")
            .arg(path_arg(&clip.yuv_path))
            .arg("-W")
            .arg(clip.width)
            .arg("-H")
            .arg(clip.height)
            .arg("-f")
            .arg(clip.rounded_fps())
            .arg("-o")
            .arg(path_arg(&output))
            .arg("-b")
            .arg(single_layer_kbps(job))
            .artifact(EncodedArtifact::new(output, 0, 0)))
    }
}
