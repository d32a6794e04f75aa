use std::collections::BTreeSet;
use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use tracing::info;

use crate::clip::prepare_clips;
use crate::config::RunConfig;
use crate::executor::ProcessExecutor;
use crate::matrix::generate_jobs;
use crate::scheduler::{Scheduler, WorkerPool};
use crate::sink::ResultSink;
use crate::tools::AnalysisTools;
use crate::{HarnessError, Job};

#[derive(Debug)]
pub struct RunReport {
    pub total_jobs: usize,
    pub failed_jobs: usize,
    pub failed: bool,
    pub dry_run: bool,
    /// Records written to the result document.
    pub records: usize,
}

impl RunReport {
    pub fn exit_code(&self) -> u8 {
        u8::from(self.failed)
    }
}

/// Prepares clips, runs the whole job matrix and writes the result document.
///
/// Configuration problems abort before anything runs. Job failures never do; they
/// only show up in the report.
pub fn run(config: &RunConfig) -> Result<RunReport, HarnessError> {
    config.validate()?;
    let workers = config.worker_count()?;

    let scratch_root = config.scratch_root.clone().unwrap_or_else(env::temp_dir);
    let scratch = tempfile::Builder::new()
        .prefix("video-quality-")
        .tempdir_in(&scratch_root)
        .map_err(|source| HarnessError::Scratch {
            path: scratch_root.clone(),
            source,
        })?;

    let clips = prepare_clips(
        &config.clips,
        scratch.path(),
        config.frame_offset,
        config.num_frames,
    )?;
    let jobs = generate_jobs(&clips, &config.encoders, config.layers)?;

    if config.dump_commands {
        dump_commands(config, &jobs)?;
        return Ok(RunReport {
            total_jobs: jobs.len(),
            failed_jobs: 0,
            failed: false,
            dry_run: true,
            records: 0,
        });
    }

    for pair in &config.encoders {
        config
            .tools
            .resolve(pair.encoder.command().binary(config.layers))?;
    }
    let codecs = config
        .encoders
        .iter()
        .map(|pair| pair.codec)
        .collect::<BTreeSet<_>>();
    let analysis = AnalysisTools::resolve(&config.tools, codecs, config.enable_vmaf)?;

    let writer: Box<dyn Write + Send> = match &config.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).map_err(|source| {
            HarnessError::Output {
                path: path.clone(),
                source,
            }
        })?)),
        None => Box::new(io::stdout()),
    };

    info!(
        jobs = jobs.len(),
        workers = workers.get(),
        scratch = %scratch.path().display(),
        "starting run"
    );
    let total_jobs = jobs.len();
    let sink = ResultSink::open(writer, total_jobs)?;
    let scheduler = Scheduler::new(jobs, sink);
    let executor = ProcessExecutor::new(
        config.tools.clone(),
        analysis,
        scratch.path(),
        config.encoded_file_dir.clone(),
    );
    WorkerPool::new(workers).run(&scheduler, &executor);

    let failed = scheduler.has_failed();
    let sink = scheduler.into_sink();
    let failed_jobs = sink.failed();
    let (_, records) = sink.finish()?;
    info!(total_jobs, failed_jobs, records, "run finished");

    Ok(RunReport {
        total_jobs,
        failed_jobs,
        failed,
        dry_run: false,
        records,
    })
}

fn dump_commands(config: &RunConfig, jobs: &[Job]) -> Result<(), HarnessError> {
    let work_dir = config
        .scratch_root
        .clone()
        .unwrap_or_else(env::temp_dir)
        .join("job");
    let mut out = io::stdout().lock();
    let total = jobs.len();
    for (index, job) in jobs.iter().enumerate() {
        let builder = job.encoder.command();
        let mut spec = builder.build(job, &work_dir)?;
        spec.program = config.tools.root().join(&spec.program);
        writeln!(out, "[{}/{total}] {job}", index + 1).map_err(crate::SinkError::from)?;
        writeln!(out, "> {spec}").map_err(crate::SinkError::from)?;
    }
    Ok(())
}
