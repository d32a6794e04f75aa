//! Decoders for the three output dialects of the analysis tools: `Key: value`
//! summaries, per-frame CSV and the VMAF JSON report.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;

use crate::ParseError;

const SSIM_SOURCE: &str = "tiny_ssim summary";
const VMAF_SOURCE: &str = "vmaf report";

/// tiny_ssim key -> record key.
const SSIM_KEYS: &[(&str, &str)] = &[
    ("AvgPSNR", "avg-psnr"),
    ("AvgPSNR-Y", "avg-psnr-y"),
    ("AvgPSNR-U", "avg-psnr-u"),
    ("AvgPSNR-V", "avg-psnr-v"),
    ("GlbPSNR", "glb-psnr"),
    ("GlbPSNR-Y", "glb-psnr-y"),
    ("GlbPSNR-U", "glb-psnr-u"),
    ("GlbPSNR-V", "glb-psnr-v"),
    ("SSIM", "ssim"),
    ("SSIM-Y", "ssim-y"),
    ("SSIM-U", "ssim-u"),
    ("SSIM-V", "ssim-v"),
    ("VpxSSIM", "vpx-ssim"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct SsimSummary {
    /// Record key and value, in output order.
    pub metrics: Vec<(&'static str, f64)>,
    pub frame_count: u64,
}

pub fn parse_ssim_summary(text: &str) -> Result<SsimSummary, ParseError> {
    let mut metrics = Vec::new();
    let mut frame_count = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(ParseError::Malformed {
                source_name: SSIM_SOURCE,
                line: index + 1,
                content: line.to_owned(),
            });
        };
        let (key, value) = (key.trim(), value.trim());
        let invalid = || ParseError::InvalidNumber {
            source_name: SSIM_SOURCE,
            line: index + 1,
            key: key.to_owned(),
            value: value.to_owned(),
        };

        if key == "Nframes" {
            frame_count = Some(value.parse::<u64>().map_err(|_| invalid())?);
            continue;
        }
        let Some((_, record_key)) = SSIM_KEYS.iter().find(|(tool_key, _)| *tool_key == key) else {
            continue;
        };
        let value = value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(invalid)?;
        metrics.push((*record_key, value));
    }

    let frame_count = frame_count.ok_or(ParseError::MissingField {
        source_name: SSIM_SOURCE,
        field: "Nframes",
    })?;
    Ok(SsimSummary {
        metrics,
        frame_count,
    })
}

/// Columns of a per-frame CSV, header order preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats<T> {
    pub columns: Vec<(String, Vec<T>)>,
}

impl<T> FrameStats<T> {
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, values)| values.len())
    }
}

pub fn parse_frame_stats<T: FromStr>(
    text: &str,
    source_name: &'static str,
) -> Result<FrameStats<T>, ParseError> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Ok(FrameStats {
            columns: Vec::new(),
        });
    };
    let mut columns = header
        .split(',')
        .map(|name| (name.trim().to_owned(), Vec::new()))
        .collect::<Vec<(String, Vec<T>)>>();

    for (index, line) in lines {
        let cells = line.split(',').map(str::trim).collect::<Vec<_>>();
        if cells.len() != columns.len() {
            return Err(ParseError::ColumnCount {
                source_name,
                line: index + 1,
                expected: columns.len(),
                found: cells.len(),
            });
        }
        for ((name, values), cell) in columns.iter_mut().zip(cells) {
            let value = cell
                .parse::<T>()
                .ok()
                .filter(|_| !non_finite(cell))
                .ok_or_else(|| ParseError::InvalidNumber {
                    source_name,
                    line: index + 1,
                    key: name.clone(),
                    value: cell.to_owned(),
                })?;
            values.push(value);
        }
    }
    Ok(FrameStats { columns })
}

/// `inf`, `NaN` and friends parse as floats but have no JSON form.
fn non_finite(cell: &str) -> bool {
    cell.parse::<f64>().is_ok_and(|v| !v.is_finite())
}

#[derive(Debug, Deserialize)]
struct RawVmafReport {
    aggregate: BTreeMap<String, f64>,
    #[serde(default)]
    frames: Vec<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VmafReport {
    pub score: f64,
    pub frames: Vec<f64>,
}

pub fn parse_vmaf_report(text: &str) -> Result<VmafReport, ParseError> {
    let raw: RawVmafReport = serde_json::from_str(text).map_err(|source| ParseError::Json {
        source_name: VMAF_SOURCE,
        source,
    })?;
    let missing = ParseError::MissingField {
        source_name: VMAF_SOURCE,
        field: "VMAF_score",
    };
    let score = *raw.aggregate.get("VMAF_score").ok_or(missing)?;
    let frames = raw
        .frames
        .iter()
        .map(|frame| {
            frame.get("VMAF_score").copied().ok_or(ParseError::MissingField {
                source_name: VMAF_SOURCE,
                field: "VMAF_score",
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(VmafReport { score, frames })
}
