//! Self-contained units of work, so they can be handed to another process

use crate::pipeline;
use crate::Settings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One WebP to one GIF
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub settings: Settings,
}

/// One WebP to a directory of PNG frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportJob {
    pub input: PathBuf,
    pub target_dir: PathBuf,
    pub overwrite: bool,
    pub include_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Job {
    Convert(ConversionJob),
    Export(ExportJob),
}

/// How a job ended. Errors have already been logged by the time this is returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Done,
    Skipped,
    Failed,
}

impl Job {
    pub fn input(&self) -> &Path {
        match self {
            Self::Convert(job) => &job.input,
            Self::Export(job) => &job.input,
        }
    }

    /// Runs in the current thread. Never panics on bad input files.
    pub fn run(&self) -> JobOutcome {
        match self {
            Self::Convert(job) => pipeline::run_conversion(job),
            Self::Export(job) => pipeline::run_export(job),
        }
    }
}
