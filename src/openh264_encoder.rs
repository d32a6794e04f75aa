use std::path::Path;

use crate::command::{EncoderCommand, path_arg, single_layer_kbps};
use crate::{Codec, CommandSpec, ConfigError, EncodedArtifact, EncoderKind, Job, LayerConfig};

#[derive(Debug, Clone, Copy)]
pub struct OpenH264Command;

impl EncoderCommand for OpenH264Command {
    fn kind(&self) -> EncoderKind {
        EncoderKind::OpenH264
    }

    fn supported_codecs(&self) -> &'static [Codec] {
        &[Codec::H264]
    }

    fn binary(&self, _layers: LayerConfig) -> &'static str {
        "openh264/h264enc"
    }

    fn build(&self, job: &Job, work_dir: &Path) -> Result<CommandSpec, ConfigError> {
        self.check(job.codec, job.layers)?;
        let clip = &job.clip;
        let kbps = single_layer_kbps(job);
        let output = work_dir.join("encoded.264");

        // h264enc takes the exact input rate, not the rounded one.
        Ok(CommandSpec::new(self.binary(job.layers))
            .args(["-rc", "1", "-denois", "0", "-scene", "0", "-bgd", "0", "-fs", "0"])
            .arg("-tarb")
            .arg(kbps)
            .arg("-sw")
            .arg(clip.width)
            .arg("-sh")
            .arg(clip.height)
            .arg("-frin")
            .arg(clip.fps)
            .arg("-org")
            .arg(path_arg(&clip.yuv_path))
            .arg("-bf")
            .arg(path_arg(&output))
            .args(["-numl", "1"])
            .args(["-dw", "0"])
            .arg(clip.width)
            .args(["-dh", "0"])
            .arg(clip.height)
            .args(["-frout", "0"])
            .arg(clip.fps)
            .args(["-ltarb", "0"])
            .arg(kbps)
            .artifact(EncodedArtifact::new(output, 0, 0)))
    }
}
