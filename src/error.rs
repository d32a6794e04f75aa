use std::path::PathBuf;

use thiserror::Error;

use crate::{Codec, EncoderKind};

/// Problems detected before any job is scheduled. All of them abort the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid clip descriptor '{descriptor}': {reason}")]
    InvalidClip { descriptor: String, reason: String },
    #[error("clip '{path}' contains no complete frames")]
    EmptyClip { path: PathBuf },
    #[error("frame offset {offset} is beyond the {total} frames of '{path}'")]
    FrameOffsetOutOfRange {
        path: PathBuf,
        offset: u64,
        total: u64,
    },
    #[error("failed to prepare clip '{path}'")]
    ClipIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("clip conversion failed for '{path}': {detail}")]
    ClipConversion { path: PathBuf, detail: String },
    #[error("unknown encoder: {0}")]
    UnknownEncoder(String),
    #[error("unknown codec: {0}")]
    UnknownCodec(String),
    #[error("invalid encoder pair '{0}', expected encoder:codec")]
    InvalidEncoderPair(String),
    #[error("encoder {encoder} does not support codec {codec}")]
    UnsupportedCodec { encoder: EncoderKind, codec: Codec },
    #[error("encoder {encoder} does not support {spatial} spatial x {temporal} temporal layers")]
    UnsupportedLayers {
        encoder: EncoderKind,
        spatial: u32,
        temporal: u32,
    },
    #[error("unsupported layer configuration: {0}")]
    InvalidLayers(String),
    #[error("invalid bitrate ladder: {0}")]
    InvalidLadder(String),
    #[error("required tool '{tool}' not found (looked in {searched})")]
    MissingTool { tool: String, searched: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Decoding failures for the text/CSV/JSON dialects spoken by the analysis tools.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{source_name} line {line}: malformed entry '{content}'")]
    Malformed {
        source_name: &'static str,
        line: usize,
        content: String,
    },
    #[error("{source_name} line {line}: value '{value}' for '{key}' is not a number")]
    InvalidNumber {
        source_name: &'static str,
        line: usize,
        key: String,
        value: String,
    },
    #[error("{source_name} line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        source_name: &'static str,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{source_name}: missing required field '{field}'")]
    MissingField {
        source_name: &'static str,
        field: &'static str,
    },
    #[error("{source_name}: invalid json")]
    Json {
        source_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A single layer of an otherwise successful job could not be measured.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to run {tool}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {output}")]
    ToolFailed {
        tool: String,
        status: String,
        output: String,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("layer decoded to zero frames")]
    ZeroFrames,
    #[error("target bitrate for temporal layer {0} is zero")]
    ZeroTargetBitrate(u32),
    #[error("no target bitrate for temporal layer {0}")]
    MissingLayerBitrate(u32),
    #[error("temporal layer {layer} is out of range for a {layers}-layer encode")]
    TemporalLayerOutOfRange { layer: u32, layers: u32 },
    #[error("artifact i/o failed for '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures isolated to one job. Sibling jobs are never affected.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to create job workspace")]
    Workspace(#[source] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn encoder\n> {command}\n{source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoder exited with {status}\n> {command}\n{output}")]
    EncoderFailed {
        command: String,
        status: String,
        output: String,
    },
    #[error("layer sl{spatial} tl{temporal}: {source}")]
    Layer {
        spatial: u32,
        temporal: u32,
        #[source]
        source: ExtractError,
    },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write results")]
    Write(#[from] std::io::Error),
    #[error("failed to serialize record")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ResultSetError {
    #[error("failed to read result document '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("result document line {line}: invalid record")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("record {index} is missing '{field}'")]
    MissingField { index: usize, field: &'static str },
    #[error("record {index} has an empty bitrate ladder")]
    EmptyLadder { index: usize },
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to create scratch directory in '{path}'")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open output '{path}'")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Sink(#[from] SinkError),
}
