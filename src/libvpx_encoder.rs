use std::path::Path;

use crate::command::{EncoderCommand, path_arg, single_layer_kbps};
use crate::{Codec, CommandSpec, ConfigError, EncodedArtifact, EncoderKind, Job, LayerConfig};

// Settings track the realtime configuration WebRTC uses for libvpx.
const THREADS: u32 = 4;

const COMMON_PARAMS: &[&str] = &[
    "--lag-in-frames=0",
    "--error-resilient=1",
    "--kf-min-dist=3000",
    "--kf-max-dist=3000",
    "--static-thresh=1",
    "--end-usage=cbr",
    "--undershoot-pct=100",
    "--overshoot-pct=15",
    "--buf-sz=1000",
    "--buf-initial-sz=500",
    "--buf-optimal-sz=600",
    "--max-intra-rate=900",
    "--resize-allowed=0",
    "--drop-frame=0",
    "--passes=1",
    "--rt",
    "--noise-sensitivity=0",
];

const VP8_PARAMS: &[&str] = &[
    "--codec=vp8",
    "--cpu-used=-6",
    "--min-q=2",
    "--max-q=56",
    "--screen-content-mode=0",
];

const VP9_PARAMS: &[&str] = &[
    "--codec=vp9",
    "--cpu-used=7",
    "--min-q=2",
    "--max-q=52",
    "--aq-mode=3",
];

#[derive(Debug, Clone, Copy)]
pub struct LibvpxRtCommand;

impl LibvpxRtCommand {
    fn single_layer(&self, job: &Job, work_dir: &Path) -> Result<CommandSpec, ConfigError> {
        let codec_params = match job.codec {
            Codec::Vp8 => VP8_PARAMS,
            Codec::Vp9 => VP9_PARAMS,
            codec => {
                return Err(ConfigError::UnsupportedCodec {
                    encoder: self.kind(),
                    codec,
                });
            }
        };
        let clip = &job.clip;
        let output = work_dir.join("encoded.webm");
        Ok(CommandSpec::new(self.binary(job.layers))
            .args(codec_params)
            .args(COMMON_PARAMS)
            .arg(format!("--threads={THREADS}"))
            .arg(format!("--fps={}/1", clip.rounded_fps()))
            .arg(format!("--target-bitrate={}", single_layer_kbps(job)))
            .arg(format!("--width={}", clip.width))
            .arg(format!("--height={}", clip.height))
            .arg(format!("--output={}", path_arg(&output)))
            .arg(path_arg(&clip.yuv_path))
            .artifact(EncodedArtifact::new(output, 0, 0)))
    }

    fn temporal_layers(&self, job: &Job, work_dir: &Path) -> CommandSpec {
        // TODO: drop cpu-used for low resolutions the way vpxenc does (-4 / 5).
        let cpu_used = if job.codec == Codec::Vp8 { 6 } else { 7 };
        let layering_mode = if job.layers.temporal == 2 { 8 } else { 10 };
        let prefix = work_dir.join("out");
        let clip = &job.clip;

        let spec = CommandSpec::new(self.binary(job.layers))
            .arg(path_arg(&clip.yuv_path))
            .arg(path_arg(&prefix))
            .arg(job.codec)
            .arg(clip.width)
            .arg(clip.height)
            .arg(1)
            .arg(clip.rounded_fps())
            .arg(cpu_used)
            .arg(0)
            .arg(THREADS)
            .arg(layering_mode)
            .args(&job.target_bitrates_kbps);

        (0..job.layers.temporal).fold(spec, |spec, layer| {
            let path = work_dir.join(format!("out_{layer}.ivf"));
            spec.artifact(EncodedArtifact::new(path, 0, layer))
        })
    }
}

impl EncoderCommand for LibvpxRtCommand {
    fn kind(&self) -> EncoderKind {
        EncoderKind::LibvpxRt
    }

    fn supported_codecs(&self) -> &'static [Codec] {
        &[Codec::Vp8, Codec::Vp9]
    }

    fn max_temporal_layers(&self) -> u32 {
        3
    }

    fn binary(&self, layers: LayerConfig) -> &'static str {
        if layers.temporal > 1 {
            "libvpx/examples/vpx_temporal_svc_encoder"
        } else {
            "libvpx/vpxenc"
        }
    }

    fn build(&self, job: &Job, work_dir: &Path) -> Result<CommandSpec, ConfigError> {
        self.check(job.codec, job.layers)?;
        if job.layers.temporal > 1 {
            Ok(self.temporal_layers(job, work_dir))
        } else {
            self.single_layer(job, work_dir)
        }
    }
}
