use std::path::PathBuf;
use std::sync::Arc;

use crate::{Clip, Codec, EncoderKind, EncoderPair, Job, LayerConfig};

pub(crate) fn clip(width: u32, height: u32) -> Arc<Clip> {
    Arc::new(Clip {
        input_path: PathBuf::from("/clips/foreman_cif.yuv"),
        yuv_path: PathBuf::from("/clips/foreman_cif.yuv"),
        width,
        height,
        fps: 29.97,
        sha256: "00".to_string(),
        total_frames: 300,
        frame_offset: 0,
        frames: 300,
    })
}

pub(crate) fn job(encoder: EncoderKind, codec: Codec, bitrates: &[u32]) -> Job {
    let layers = LayerConfig {
        spatial: 1,
        temporal: bitrates.len() as u32,
    };
    Job::new(
        EncoderPair { encoder, codec },
        clip(352, 288),
        bitrates.to_vec(),
        layers,
    )
    .unwrap()
}
