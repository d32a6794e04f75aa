use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, info};

use crate::SinkError;
use crate::executor::JobOutcome;

#[derive(Debug)]
struct SinkState<W> {
    writer: W,
    completed: usize,
    failed: usize,
    written: usize,
}

/// Append-only result document shared by all workers.
///
/// Output is `[`, one record per line followed by `,`, then `]`, so a run that dies
/// midway still leaves every finished record on disk.
#[derive(Debug)]
pub struct ResultSink<W: Write> {
    total: usize,
    state: Mutex<SinkState<W>>,
}

impl<W: Write> ResultSink<W> {
    pub fn open(mut writer: W, total: usize) -> Result<Self, SinkError> {
        writer.write_all(b"[\n")?;
        writer.flush()?;
        Ok(Self {
            total,
            state: Mutex::new(SinkState {
                writer,
                completed: 0,
                failed: 0,
                written: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SinkState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a finished job. Returns the 1-based completion count.
    pub fn record(&self, label: &str, outcome: JobOutcome) -> Result<usize, SinkError> {
        let lines = outcome
            .records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        let ok = outcome.is_ok();

        let mut state = self.lock();
        state.completed += 1;
        let completed = state.completed;
        if ok {
            info!("[{completed}/{}] {label} (OK)", self.total);
        } else {
            state.failed += 1;
            info!("[{completed}/{}] {label} (ERROR)", self.total);
            for err in &outcome.errors {
                error!("{label}: {err}");
            }
        }
        for line in &lines {
            writeln!(state.writer, "{line},")?;
        }
        state.writer.flush()?;
        state.written += lines.len();
        Ok(completed)
    }

    pub fn completed(&self) -> usize {
        self.lock().completed
    }

    pub fn failed(&self) -> usize {
        self.lock().failed
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.lock().written
    }

    /// Closes the document and hands back the writer with the number of records written.
    pub fn finish(self) -> Result<(W, usize), SinkError> {
        let mut state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        state.writer.write_all(b"]\n")?;
        state.writer.flush()?;
        Ok((state.writer, state.written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobError;
    use crate::record::{MetricRecord, ResultSet};

    fn document(bytes: Vec<u8>) -> ResultSet {
        ResultSet::parse(&String::from_utf8(bytes).unwrap()).unwrap()
    }

    fn outcome(values: &[i64]) -> JobOutcome {
        JobOutcome {
            records: values
                .iter()
                .map(|v| {
                    let mut record = MetricRecord::new();
                    record.insert("v", *v);
                    record
                })
                .collect(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn writes_parsable_document() {
        let sink = ResultSink::open(Vec::new(), 2).unwrap();
        assert_eq!(sink.record("a", outcome(&[1, 2])).unwrap(), 1);
        assert_eq!(sink.record("b", outcome(&[3])).unwrap(), 2);
        assert_eq!(sink.written(), 3);
        let (bytes, written) = sink.finish().unwrap();
        assert_eq!(written, 3);
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "[\n{\"v\":1},\n{\"v\":2},\n{\"v\":3},\n]\n");
        assert_eq!(ResultSet::parse(&text).unwrap().len(), 3);
    }

    #[test]
    fn failures_are_counted_and_keep_partial_layers() {
        let sink = ResultSink::open(Vec::new(), 2).unwrap();
        sink.record(
            "bad",
            JobOutcome::failed(JobError::Workspace(std::io::Error::other("disk full"))),
        )
        .unwrap();
        let mut partial = outcome(&[7]);
        partial
            .errors
            .push(JobError::Workspace(std::io::Error::other("layer 1")));
        sink.record("partial", partial).unwrap();
        assert_eq!(sink.completed(), 2);
        assert_eq!(sink.failed(), 2);
        let (bytes, written) = sink.finish().unwrap();
        assert_eq!(written, 1);
        assert_eq!(document(bytes).len(), 1);
    }

    #[test]
    fn concurrent_appends_stay_line_atomic() {
        let sink = ResultSink::open(Vec::new(), 64).unwrap();
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let sink = &sink;
                scope.spawn(move || {
                    for i in 0..8 {
                        sink.record("job", outcome(&[worker * 100 + i, -1])).unwrap();
                    }
                });
            }
        });
        let (bytes, written) = sink.finish().unwrap();
        assert_eq!(written, 128);
        let set = document(bytes);
        assert_eq!(set.len(), 128);
        // Both records of a job land next to each other.
        for pair in set.records().chunks(2) {
            assert_eq!(pair[1].as_i64("v"), Some(-1));
        }
    }
}
