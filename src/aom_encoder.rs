use std::path::Path;

use crate::command::{EncoderCommand, path_arg, single_layer_kbps};
use crate::{Codec, CommandSpec, ConfigError, EncodedArtifact, EncoderKind, Job, LayerConfig};

const GOOD_QUALITY_PARAMS: &[&str] = &[
    "--codec=av1",
    "-p",
    "2",
    "--good",
    "--cpu-used=0",
    "--lag-in-frames=25",
    "--min-q=0",
    "--max-q=63",
    "--auto-alt-ref=1",
    "--kf-max-dist=150",
    "--kf-min-dist=0",
    "--drop-frame=0",
    "--static-thresh=0",
    "--bias-pct=50",
    "--minsection-pct=0",
    "--maxsection-pct=2000",
    "--arnr-maxframes=7",
    "--arnr-strength=5",
    "--sharpness=0",
    "--undershoot-pct=100",
    "--overshoot-pct=100",
    "--frame-parallel=0",
    "--tile-columns=0",
    "--profile=0",
];

/// Two-pass libaom encode in good-quality mode. There is no realtime variant yet.
#[derive(Debug, Clone, Copy)]
pub struct AomGoodCommand;

impl EncoderCommand for AomGoodCommand {
    fn kind(&self) -> EncoderKind {
        EncoderKind::AomGood
    }

    fn supported_codecs(&self) -> &'static [Codec] {
        &[Codec::Av1]
    }

    fn binary(&self, _layers: LayerConfig) -> &'static str {
        "aom/aomenc"
    }

    fn build(&self, job: &Job, work_dir: &Path) -> Result<CommandSpec, ConfigError> {
        self.check(job.codec, job.layers)?;
        let clip = &job.clip;
        let first_pass = work_dir.join("first-pass.fpf");
        let output = work_dir.join("encoded.webm");

        Ok(CommandSpec::new(self.binary(job.layers))
            .args(GOOD_QUALITY_PARAMS)
            .arg(format!("--fpf={}", path_arg(&first_pass)))
            .arg(format!("--target-bitrate={}", single_layer_kbps(job)))
            .arg(format!("--fps={}/1", clip.rounded_fps()))
            .arg(format!("--width={}", clip.width))
            .arg(format!("--height={}", clip.height))
            .arg(format!("--output={}", path_arg(&output)))
            .arg(path_arg(&clip.yuv_path))
            .artifact(EncodedArtifact::new(output, 0, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::job;

    #[test]
    fn builds_two_pass_command() {
        let job = job(EncoderKind::AomGood, Codec::Av1, &[800]);
        let spec = AomGoodCommand.build(&job, Path::new("/w")).unwrap();
        assert_eq!(spec.program, Path::new("aom/aomenc"));
        assert!(spec.args.contains(&"--fpf=/w/first-pass.fpf".to_string()));
        assert!(spec.args.contains(&"--target-bitrate=800".to_string()));
        assert!(spec.args.contains(&"--width=352".to_string()));
        assert_eq!(spec.artifacts[0].path, Path::new("/w/encoded.webm"));
    }

    #[test]
    fn rejects_other_codecs() {
        let mut job = job(EncoderKind::AomGood, Codec::Av1, &[800]);
        job.codec = Codec::Vp9;
        let err = AomGoodCommand.build(&job, Path::new("/w")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedCodec { codec: Codec::Vp9, .. }));
    }
}
