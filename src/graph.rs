//! Groups a result document into per-clip, per-layering curves for plotting.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::GraphError;
use crate::record::MetricRecord;

pub const DEFAULT_METRICS: &[&str] = &["ssim", "avg-psnr", "glb-psnr"];

/// Maps a ladder to integer percentages of its last entry.
///
/// `[400, 800, 1200]` becomes `[33, 66, 100]`, and normalizing that again is a no-op.
pub fn normalize_ladder(ladder: &[u32]) -> Vec<u32> {
    let Some(&top) = ladder.last() else {
        return Vec::new();
    };
    if top == 0 {
        return vec![0; ladder.len()];
    }
    ladder
        .iter()
        .map(|&kbps| (u64::from(kbps) * 100 / u64::from(top)) as u32)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GraphPoint {
    pub target_bitrate_bps: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Graph {
    pub input_file: String,
    pub layer_pattern: String,
    pub ladder_percent: Vec<u32>,
    pub metric: String,
    pub curves: BTreeMap<String, Vec<GraphPoint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphData {
    pub graphs: BTreeMap<String, Graph>,
}

fn field<'a>(record: &'a MetricRecord, index: usize, name: &'static str) -> Result<&'a str, GraphError> {
    record
        .as_str(name)
        .ok_or(GraphError::MissingField { index, field: name })
}

fn int_field(record: &MetricRecord, index: usize, name: &'static str) -> Result<i64, GraphError> {
    record
        .as_i64(name)
        .ok_or(GraphError::MissingField { index, field: name })
}

pub fn build_graph_data<'a, M>(records: &[MetricRecord], metrics: M) -> Result<GraphData, GraphError>
where
    M: IntoIterator<Item = &'a str>,
    M::IntoIter: Clone,
{
    let metrics = metrics.into_iter();
    let mut data = GraphData::default();

    for (index, record) in records.iter().enumerate() {
        let input = field(record, index, "input-file")?;
        let pattern = field(record, index, "layer-pattern")?;
        let encoder = field(record, index, "encoder")?;
        let codec = field(record, index, "codec")?;
        let layer = int_field(record, index, "temporal-layer")?;
        let target = int_field(record, index, "target-bitrate-bps")?;
        let ladder = record
            .as_int_list("bitrate-config-kbps")
            .ok_or(GraphError::MissingField {
                index,
                field: "bitrate-config-kbps",
            })?
            .iter()
            .map(|&kbps| u32::try_from(kbps).unwrap_or(0))
            .collect::<Vec<_>>();
        if ladder.is_empty() {
            return Err(GraphError::EmptyLadder { index });
        }
        let percent = normalize_ladder(&ladder);
        let percent_label = percent
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("_");
        let curve = format!("{encoder}-{codec}-tl{layer}");

        for metric in metrics.clone() {
            let Some(value) = record.as_f64(metric) else {
                continue;
            };
            let name = format!("{input}-{pattern}-{percent_label}:{metric}");
            let graph = data.graphs.entry(name).or_insert_with(|| Graph {
                input_file: input.to_owned(),
                layer_pattern: pattern.to_owned(),
                ladder_percent: percent.clone(),
                metric: metric.to_owned(),
                curves: BTreeMap::new(),
            });
            graph
                .curves
                .entry(curve.clone())
                .or_default()
                .push(GraphPoint {
                    target_bitrate_bps: target,
                    value,
                });
        }
    }

    for graph in data.graphs.values_mut() {
        for points in graph.curves.values_mut() {
            points.sort_by_key(|p| p.target_bitrate_bps);
        }
    }
    Ok(data)
}
