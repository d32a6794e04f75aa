use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::thread;

use crate::clip::ClipDescriptor;
use crate::tools::ToolLocator;
use crate::{ConfigError, EncoderPair, LayerConfig};

/// Everything one benchmark run needs. Built by the CLI, checked by [`RunConfig::validate`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub clips: Vec<ClipDescriptor>,
    pub encoders: Vec<EncoderPair>,
    pub layers: LayerConfig,
    pub workers: usize,
    pub frame_offset: u64,
    pub num_frames: Option<u64>,
    /// Result document path; `None` writes to stdout.
    pub output: Option<PathBuf>,
    pub encoded_file_dir: Option<PathBuf>,
    pub enable_vmaf: bool,
    pub dump_commands: bool,
    pub tools: ToolLocator,
    /// Parent of the run's scratch directory; the system temp dir when unset.
    pub scratch_root: Option<PathBuf>,
}

impl RunConfig {
    pub fn new(clips: Vec<ClipDescriptor>, encoders: Vec<EncoderPair>, tools: ToolLocator) -> Self {
        Self {
            clips,
            encoders,
            layers: LayerConfig::default(),
            workers: default_workers(),
            frame_offset: 0,
            num_frames: None,
            output: None,
            encoded_file_dir: None,
            enable_vmaf: false,
            dump_commands: false,
            tools,
            scratch_root: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clips.is_empty() {
            return Err(ConfigError::Invalid("no clips given".to_owned()));
        }
        if self.encoders.is_empty() {
            return Err(ConfigError::Invalid("no encoders given".to_owned()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("worker count must be at least 1".to_owned()));
        }
        if self.num_frames == Some(0) {
            return Err(ConfigError::Invalid("--num-frames must be at least 1".to_owned()));
        }
        self.layers.validate()?;

        if let Some(dir) = &self.encoded_file_dir {
            // Write mode bits alone miss ownership and ACLs.
            let writable = dir.is_dir() && tempfile::tempfile_in(dir).is_ok();
            if !writable {
                return Err(ConfigError::Invalid(format!(
                    "encoded file dir '{}' is not a writable directory",
                    dir.display()
                )));
            }
        }
        if let Some(dir) = &self.scratch_root
            && !dir.is_dir()
        {
            return Err(ConfigError::Invalid(format!(
                "scratch dir '{}' does not exist",
                dir.display()
            )));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.workers)
            .ok_or_else(|| ConfigError::Invalid("worker count must be at least 1".to_owned()))
    }
}

pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
