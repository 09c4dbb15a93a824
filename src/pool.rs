//! Fixed-size pool of workers running jobs either in threads or in child processes

use crate::error::*;
use crate::job::{Job, JobOutcome};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

/// Hidden CLI flag that turns the executable into a single-job worker
pub const WORKER_ARG: &str = "--worker-job";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// Jobs run on the pool's threads
    #[default]
    Threads,
    /// Every job runs in a fresh child process of this executable (see `WORKER_ARG`)
    Processes(PathBuf),
}

impl Parallelism {
    /// Child processes of the currently running executable
    pub fn current_exe() -> ConvResult<Self> {
        Ok(Self::Processes(std::env::current_exe()?))
    }

    pub(crate) fn runner(&self) -> Box<dyn Runner + '_> {
        match self {
            Self::Threads => Box::new(InProcess),
            Self::Processes(exe) => Box::new(WorkerProcess { exe }),
        }
    }
}

pub(crate) trait Runner: Sync {
    fn run(&self, job: &Job) -> JobOutcome;
}

struct InProcess;

impl Runner for InProcess {
    fn run(&self, job: &Job) -> JobOutcome {
        job.run()
    }
}

struct WorkerProcess<'a> {
    exe: &'a PathBuf,
}

impl Runner for WorkerProcess<'_> {
    fn run(&self, job: &Job) -> JobOutcome {
        self.spawn(job).unwrap_or_else(|err| {
            log::error!("{}: {}", job.input().display(), err);
            JobOutcome::Failed
        })
    }
}

impl WorkerProcess<'_> {
    /// Job goes to the child's stdin as JSON, the outcome comes back on its stdout
    fn spawn(&self, job: &Job) -> ConvResult<JobOutcome> {
        let mut child = Command::new(self.exe)
            .arg(WORKER_ARG)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Worker(format!("can't start {}: {}", self.exe.display(), e)))?;

        let json = serde_json::to_vec(job).map_err(|e| Error::Worker(e.to_string()))?;
        let mut stdin = child.stdin.take().ok_or_else(|| Error::Worker("child has no stdin".into()))?;
        stdin.write_all(&json)?;
        drop(stdin);

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::Worker(format!("exited with {}", output.status)));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| Error::Worker(format!("bad reply: {e}")))
    }
}

/// Body of a worker process: reads one job, runs it, prints the outcome
pub fn serve_one_job(input: impl std::io::Read, mut output: impl Write) -> ConvResult<JobOutcome> {
    let job: Job = serde_json::from_reader(input).map_err(|e| Error::Worker(format!("bad job: {e}")))?;
    let outcome = job.run();
    serde_json::to_writer(&mut output, &outcome).map_err(|e| Error::Worker(e.to_string()))?;
    output.flush()?;
    Ok(outcome)
}

/// Runs all jobs on at most `workers` threads.
///
/// `on_done` is called on the calling thread as jobs finish, in completion order.
pub(crate) fn run_jobs(jobs: &[Job], workers: usize, runner: &dyn Runner, on_done: impl FnMut(&Job, JobOutcome)) -> ConvResult<()> {
    run_jobs_on(jobs, workers, runner, on_done, |n| Ok(thread::Builder::new().name(format!("w{n}"))))
}

fn run_jobs_on(jobs: &[Job], workers: usize, runner: &dyn Runner, mut on_done: impl FnMut(&Job, JobOutcome),
    new_thread: impl Fn(usize) -> io::Result<thread::Builder>) -> ConvResult<()> {
    if jobs.is_empty() {
        return Ok(());
    }
    let (job_tx, job_rx) = crossbeam_channel::unbounded();
    for i in 0..jobs.len() {
        job_tx.send(i).map_err(|_| Error::ThreadSend)?;
    }
    drop(job_tx);

    let (done_tx, done_rx) = crossbeam_channel::unbounded();
    thread::scope(|s| {
        let mut started = 0;
        for n in 0..workers.clamp(1, jobs.len()) {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let res = new_thread(n).and_then(|b| b.spawn_scoped(s, move || {
                for i in job_rx {
                    let outcome = runner.run(&jobs[i]);
                    if done_tx.send((i, outcome)).is_err() {
                        break;
                    }
                }
            }));
            match res {
                Ok(_) => started += 1,
                Err(err) => {
                    log::warn!("Can't start worker thread {n}: {err}");
                    break;
                },
            }
        }
        drop(done_tx);

        // the workers that did start take all queued jobs
        for (i, outcome) in done_rx {
            on_done(&jobs[i], outcome);
        }
        if started == 0 {
            return Err(Error::ThreadSend);
        }
        Ok(())
    })
}
