mod aom_encoder;
mod clip;
mod command;
mod config;
mod contract;
mod error;
mod executor;
mod graph;
mod harness;
mod ladder;
mod libvpx_encoder;
mod matrix;
mod metrics;
mod openh264_encoder;
mod record;
mod scheduler;
mod sink;
mod tool_output;
mod tools;
mod yami_encoder;

#[cfg(test)]
mod test_support;

pub use clip::{ClipDescriptor, ClipFormat, prepare_clips, sha256_file};
pub use command::{EncoderCommand, prepare_command};
pub use config::{RunConfig, default_workers};
pub use contract::{
    Clip, Codec, CommandSpec, EncodedArtifact, EncoderKind, EncoderPair, Job, LayerConfig,
    MAX_TEMPORAL_LAYERS, i420_frame_size,
};
pub use error::{
    ConfigError, ExtractError, GraphError, HarnessError, JobError, ParseError, ResultSetError,
    SinkError,
};
pub use executor::{JobExecutor, JobOutcome, ProcessExecutor, base_record, retained_file_name};
pub use graph::{DEFAULT_METRICS, Graph, GraphData, GraphPoint, build_graph_data, normalize_ladder};
pub use harness::{RunReport, run};
pub use ladder::{LADDER_POINTS, bitrate_ladder, split_temporal_bitrates};
pub use matrix::generate_jobs;
pub use metrics::{LayerRates, MetricsExtractor};
pub use record::{MetricRecord, MetricValue, ResultSet};
pub use scheduler::{Scheduler, WorkerPool};
pub use sink::ResultSink;
pub use tool_output::{
    FrameStats, SsimSummary, VmafReport, parse_frame_stats, parse_ssim_summary, parse_vmaf_report,
};
pub use tools::{AnalysisTools, ToolLocator};
