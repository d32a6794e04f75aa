use std::sync::Arc;

use crate::ladder::{bitrate_ladder, split_temporal_bitrates};
use crate::{Clip, ConfigError, EncoderPair, Job, LayerConfig};

/// Enumerates clip x ladder point x encoder pair, in that nesting order.
///
/// Every pair is checked against its variant before anything is generated, so an
/// unsupported combination never yields a partial job list.
pub fn generate_jobs(
    clips: &[Arc<Clip>],
    pairs: &[EncoderPair],
    layers: LayerConfig,
) -> Result<Vec<Job>, ConfigError> {
    layers.validate()?;
    for pair in pairs {
        pair.encoder.command().check(pair.codec, layers)?;
    }

    let mut jobs = Vec::new();
    for clip in clips {
        for nominal in bitrate_ladder(clip.width, clip.height) {
            let bitrates = split_temporal_bitrates(nominal, layers.temporal).ok_or_else(|| {
                ConfigError::InvalidLayers(format!("{} temporal layers", layers.temporal))
            })?;
            for pair in pairs {
                jobs.push(Job::new(*pair, Arc::clone(clip), bitrates.clone(), layers)?);
            }
        }
    }
    Ok(jobs)
}
