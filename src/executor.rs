use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

use tracing::{debug, warn};

use crate::command::prepare_command;
use crate::metrics::MetricsExtractor;
use crate::record::MetricRecord;
use crate::tools::{AnalysisTools, ToolLocator};
use crate::{EncodedArtifact, Job, JobError};

/// Result of one job: the records of every layer that measured cleanly plus
/// whatever went wrong along the way.
#[derive(Debug, Default)]
pub struct JobOutcome {
    pub records: Vec<MetricRecord>,
    pub errors: Vec<JobError>,
}

impl JobOutcome {
    pub fn failed(error: JobError) -> Self {
        Self {
            records: Vec::new(),
            errors: vec![error],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub trait JobExecutor: Sync {
    fn execute(&self, job: &Job) -> JobOutcome;
}

/// Runs real encoder, decoder and analysis processes.
#[derive(Debug)]
pub struct ProcessExecutor {
    locator: ToolLocator,
    analysis: AnalysisTools,
    scratch: PathBuf,
    encoded_file_dir: Option<PathBuf>,
}

impl ProcessExecutor {
    pub fn new(
        locator: ToolLocator,
        analysis: AnalysisTools,
        scratch: impl Into<PathBuf>,
        encoded_file_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            locator,
            analysis,
            scratch: scratch.into(),
            encoded_file_dir,
        }
    }

    fn relocate(&self, job: &Job, artifact: &EncodedArtifact) {
        let Some(dir) = &self.encoded_file_dir else {
            return;
        };
        let target = dir.join(retained_file_name(job, artifact));
        let moved = fs::rename(&artifact.path, &target)
            .or_else(|_| fs::copy(&artifact.path, &target).map(|_| ()));
        if let Err(err) = moved {
            warn!(job = %job, path = %target.display(), "failed to keep encoded file: {err}");
        }
    }
}

impl JobExecutor for ProcessExecutor {
    fn execute(&self, job: &Job) -> JobOutcome {
        let work_dir = match tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.scratch)
        {
            Ok(dir) => dir,
            Err(err) => return JobOutcome::failed(JobError::Workspace(err)),
        };
        let spec = match prepare_command(job, work_dir.path(), &self.locator) {
            Ok(spec) => spec,
            Err(err) => return JobOutcome::failed(err.into()),
        };
        let command = spec.to_string();
        debug!(job = %job, "> {command}");

        let start = Instant::now();
        let (status, output) = match run_combined(spec.to_command()) {
            Ok(result) => result,
            Err(source) => return JobOutcome::failed(JobError::Spawn { command, source }),
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if !status.success() {
            return JobOutcome::failed(JobError::EncoderFailed {
                command,
                status: status.to_string(),
                output,
            });
        }

        let extractor = MetricsExtractor::new(&self.analysis);
        let base = base_record(job, elapsed_ms);
        let mut outcome = JobOutcome::default();
        for artifact in &spec.artifacts {
            match extractor.extract(job, artifact, work_dir.path()) {
                Ok(layer) => {
                    let mut record = base.clone();
                    record.insert("spatial-layer", artifact.spatial_layer);
                    record.insert("temporal-layer", artifact.temporal_layer);
                    record.merge(layer);
                    outcome.records.push(record);
                }
                Err(source) => outcome.errors.push(JobError::Layer {
                    spatial: artifact.spatial_layer,
                    temporal: artifact.temporal_layer,
                    source,
                }),
            }
            self.relocate(job, artifact);
        }
        outcome
    }
}

/// Runs `cmd` to completion with stdout and stderr on one pipe, so the captured text
/// is interleaved the way the process wrote it.
fn run_combined(mut cmd: Command) -> io::Result<(ExitStatus, String)> {
    let (mut reader, writer) = io::pipe()?;
    cmd.stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer);
    let mut child = cmd.spawn()?;
    // The command still holds the write ends; reading only sees EOF once they close.
    drop(cmd);
    let mut output = Vec::new();
    let read = reader.read_to_end(&mut output);
    let status = child.wait()?;
    read?;
    Ok((status, String::from_utf8_lossy(&output).into_owned()))
}

/// Fields shared by every layer record of a job.
pub fn base_record(job: &Job, elapsed_ms: f64) -> MetricRecord {
    let clip = &job.clip;
    let target_ms = clip.target_encode_ms();
    let mut record = MetricRecord::new();
    record.insert("input-file", clip.file_name());
    record.insert("input-file-sha256sum", clip.sha256.clone());
    record.insert("input-total-frames", clip.total_frames);
    record.insert("frame-offset", clip.frame_offset);
    record.insert(
        "bitrate-config-kbps",
        job.target_bitrates_kbps
            .iter()
            .map(|&kbps| i64::from(kbps))
            .collect::<Vec<_>>(),
    );
    record.insert("layer-pattern", job.layers.pattern());
    record.insert("encoder", job.encoder.as_str());
    record.insert("codec", job.codec.as_str());
    record.insert("width", clip.width);
    record.insert("height", clip.height);
    record.insert("fps", clip.fps);
    record.insert("actual-encode-time-ms", elapsed_ms);
    record.insert("target-encode-time-ms", target_ms);
    record.insert("encode-time-utilization", elapsed_ms / target_ms);
    record
}

/// `<clip-stem>-<encoder>-<codec>-<S>sl<T>tl-<nominal>-sl<s>-tl<t><ext>`
pub fn retained_file_name(job: &Job, artifact: &EncodedArtifact) -> String {
    format!(
        "{}-{}-{}-{}-{}-sl{}-tl{}{}",
        job.clip.stem(),
        job.encoder,
        job.codec,
        job.layers.pattern(),
        job.nominal_bitrate_kbps(),
        artifact.spatial_layer,
        artifact.temporal_layer,
        artifact.extension()
    )
}
