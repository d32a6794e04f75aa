use std::fs;
use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use crate::record::{MetricRecord, MetricValue};
use crate::tool_output::{FrameStats, parse_frame_stats, parse_ssim_summary, parse_vmaf_report};
use crate::tools::AnalysisTools;
use crate::{EncodedArtifact, ExtractError, Job};

/// Rate figures derived for one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerRates {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub target_bps: u64,
    pub actual_bps: f64,
    pub utilization: f64,
}

impl LayerRates {
    pub fn compute(
        job: &Job,
        artifact: &EncodedArtifact,
        size_bytes: u64,
        frame_count: u64,
    ) -> Result<Self, ExtractError> {
        if frame_count == 0 {
            return Err(ExtractError::ZeroFrames);
        }
        let layer = artifact.temporal_layer;
        let target_kbps = *job
            .target_bitrates_kbps
            .get(layer as usize)
            .ok_or(ExtractError::MissingLayerBitrate(layer))?;
        if target_kbps == 0 {
            return Err(ExtractError::ZeroTargetBitrate(layer));
        }

        let temporal_divide = temporal_divide(job, layer)?;
        let spatial_divide = 1u32 << (job.layers.spatial - 1 - artifact.spatial_layer);
        let fps = job.clip.fps / f64::from(temporal_divide);
        let target_bps = u64::from(target_kbps) * 1000;
        let actual_bps = size_bytes as f64 * 8.0 * fps / frame_count as f64;

        Ok(Self {
            fps,
            width: job.clip.width / spatial_divide,
            height: job.clip.height / spatial_divide,
            target_bps,
            actual_bps,
            utilization: actual_bps / target_bps as f64,
        })
    }

    fn write_into(&self, record: &mut MetricRecord) {
        record.insert("layer-fps", self.fps);
        record.insert("layer-width", self.width);
        record.insert("layer-height", self.height);
        record.insert("target-bitrate-bps", self.target_bps);
        record.insert("actual-bitrate-bps", self.actual_bps);
        record.insert("bitrate-utilization", self.utilization);
    }
}

/// Decodes artifacts and measures them against the source clip.
#[derive(Debug)]
pub struct MetricsExtractor<'a> {
    tools: &'a AnalysisTools,
}

impl<'a> MetricsExtractor<'a> {
    pub fn new(tools: &'a AnalysisTools) -> Self {
        Self { tools }
    }

    /// Layer-specific fields for one artifact. Base job fields are added by the caller.
    pub fn extract(
        &self,
        job: &Job,
        artifact: &EncodedArtifact,
        work_dir: &Path,
    ) -> Result<MetricRecord, ExtractError> {
        let suffix = format!("sl{}-tl{}", artifact.spatial_layer, artifact.temporal_layer);
        let decoded = work_dir.join(format!("decoded-{suffix}.yuv"));
        let decoder_stats = work_dir.join(format!("decoder-stats-{suffix}.csv"));
        let ssim_stats = work_dir.join(format!("ssim-stats-{suffix}.csv"));

        let skip = temporal_divide(job, artifact.temporal_layer)? - 1;
        self.decode(job, artifact, &decoded, &decoder_stats)?;

        let (width, height) = (job.clip.width, job.clip.height);
        let mut ssim = Command::new(&self.tools.ssim);
        ssim.arg(&job.clip.yuv_path)
            .arg(&decoded)
            .arg(format!("{width}x{height}"))
            .arg(skip.to_string())
            .arg(&ssim_stats);
        let summary = parse_ssim_summary(&run_tool(ssim, &self.tools.ssim)?)?;

        let mut record = MetricRecord::new();
        for (key, value) in &summary.metrics {
            record.insert(*key, *value);
        }
        record.insert("frame-count", summary.frame_count);

        if job.codec.decoder_writes_framestats() {
            let stats: FrameStats<i64> =
                parse_frame_stats(&read_stats(&decoder_stats)?, "decoder framestats")?;
            merge_frame_columns(&mut record, stats);
        }
        let stats: FrameStats<f64> = parse_frame_stats(&read_stats(&ssim_stats)?, "tiny_ssim csv")?;
        merge_frame_columns(&mut record, stats);

        if let Some(vmaf) = &self.tools.vmaf {
            self.measure_vmaf(vmaf, job, &decoded, &mut record);
        }

        let size_bytes = fs::metadata(&artifact.path)
            .map_err(|source| ExtractError::Io {
                path: artifact.path.clone(),
                source,
            })?
            .len();
        LayerRates::compute(job, artifact, size_bytes, summary.frame_count)?.write_into(&mut record);

        // Decoded output is the largest file in the job dir; drop it early.
        let _ = fs::remove_file(&decoded);
        Ok(record)
    }

    fn decode(
        &self,
        job: &Job,
        artifact: &EncodedArtifact,
        decoded: &Path,
        stats: &Path,
    ) -> Result<(), ExtractError> {
        let Some(decoder) = self.tools.decoder(job.codec) else {
            return Err(ExtractError::Spawn {
                tool: job.codec.decoder_binary().to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "decoder not resolved"),
            });
        };
        let mut cmd = Command::new(decoder);
        if job.codec.decoder_writes_framestats() {
            let mut framestats = std::ffi::OsString::from("--framestats=");
            framestats.push(stats);
            cmd.arg("--i420")
                .arg(format!("--codec={}", job.codec))
                .arg("-o")
                .arg(decoded)
                .arg(&artifact.path)
                .arg(framestats);
        } else {
            cmd.arg(&artifact.path).arg(decoded);
        }
        run_tool(cmd, decoder).map(|_| ())
    }

    fn measure_vmaf(&self, vmaf: &Path, job: &Job, decoded: &Path, record: &mut MetricRecord) {
        let mut cmd = Command::new(vmaf);
        cmd.arg("yuv420p")
            .arg(job.clip.width.to_string())
            .arg(job.clip.height.to_string())
            .arg(&job.clip.yuv_path)
            .arg(decoded)
            .args(["--out-fmt", "json"]);
        let report = run_tool(cmd, vmaf).and_then(|out| Ok(parse_vmaf_report(&out)?));
        match report {
            Ok(report) => {
                record.insert("vmaf", report.score);
                record.insert("frame-vmaf", report.frames);
            }
            Err(err) => warn!(job = %job, "vmaf skipped: {err}"),
        }
    }
}

/// Frame-rate divisor of a temporal layer; the top layer runs at the full rate.
fn temporal_divide(job: &Job, layer: u32) -> Result<u32, ExtractError> {
    job.layers
        .temporal
        .checked_sub(layer + 1)
        .map(|shift| 1 << shift)
        .ok_or(ExtractError::TemporalLayerOutOfRange {
            layer,
            layers: job.layers.temporal,
        })
}

fn merge_frame_columns<T>(record: &mut MetricRecord, stats: FrameStats<T>)
where
    Vec<T>: Into<MetricValue>,
{
    for (name, values) in stats.columns {
        record.insert(format!("frame-{name}"), values);
    }
}

fn read_stats(path: &Path) -> Result<String, ExtractError> {
    fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs a tool to completion and returns its stdout.
fn run_tool(mut cmd: Command, program: &Path) -> Result<String, ExtractError> {
    let tool = tool_name(program);
    debug!(?cmd, "running {tool}");
    let output = cmd.output().map_err(|source| ExtractError::Spawn {
        tool: tool.clone(),
        source,
    })?;
    if !output.status.success() {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(ExtractError::ToolFailed {
            tool,
            status: output.status.to_string(),
            output: combined,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}
