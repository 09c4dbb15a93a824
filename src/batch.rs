//! Converting whole directories

use crate::error::*;
use crate::job::{ConversionJob, ExportJob, Job, JobOutcome};
use crate::pool::{run_jobs, Parallelism};
use crate::progress::ProgressReporter;
use crate::Settings;
use log::info;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const INPUT_EXTENSION: &str = "webp";

/// Where outputs go relative to the output root
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Layout {
    /// Everything directly in the output root
    #[default]
    Flat,
    /// Output root mirrors the subdirectories of the input root
    Mirror,
    /// Next to each source file; the output root is ignored
    InPlace,
}

impl Layout {
    /// In-place wins if both are set
    pub fn from_flags(preserve_structure: bool, in_place: bool) -> Self {
        match (preserve_structure, in_place) {
            (_, true) => Self::InPlace,
            (true, false) => Self::Mirror,
            (false, false) => Self::Flat,
        }
    }
}

/// Options shared by the GIF and PNG passes
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_root: PathBuf,
    pub recursive: bool,
    /// At least 1
    pub workers: usize,
    pub parallelism: Parallelism,
    pub overwrite: bool,
}

#[derive(Debug, Clone)]
pub struct GifBatch {
    pub output_root: PathBuf,
    pub layout: Layout,
    pub settings: Settings,
}

#[derive(Debug, Clone)]
pub struct PngBatch {
    pub output_root: PathBuf,
    pub layout: Layout,
    pub include_static: bool,
}

/// `done + skipped == total`; failures are counted in `skipped` too
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Done => self.done += 1,
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Failed => {
                self.skipped += 1;
                self.failed += 1;
            },
        }
    }
}

/// `.webp` files in `root` (and below it if `recursive`), in natural order.
///
/// Fails only if `root` itself can't be read.
pub fn find_inputs(root: &Path, recursive: bool) -> ConvResult<Vec<PathBuf>> {
    if !fs::metadata(root)?.is_dir() {
        return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, format!("{} is not a directory", root.display()))));
    }
    let walker = WalkDir::new(root).min_depth(1).max_depth(if recursive { usize::MAX } else { 1 });
    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(readable)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map_or(false, |ext| ext.eq_ignore_ascii_case(INPUT_EXTENSION)))
        .map(|e| e.into_path())
        .collect();
    files.sort_by(|a, b| natord::compare(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(files)
}

/// Unreadable entries are left out of the batch, but not silently
fn readable(entry: walkdir::Result<walkdir::DirEntry>) -> Option<walkdir::DirEntry> {
    match entry {
        Ok(entry) => Some(entry),
        Err(err) => {
            let path = err.path().map(|p| p.display().to_string()).unwrap_or_default();
            log::warn!("Skipping unreadable {path}: {err}");
            None
        },
    }
}

/// Output location for `input`: named after its stem plus `extension` (if any)
pub fn output_path(input: &Path, input_root: &Path, output_root: &Path, layout: Layout, extension: Option<&str>) -> PathBuf {
    let mut name = OsString::from(input.file_stem().unwrap_or_default());
    if let Some(ext) = extension {
        name.push(".");
        name.push(ext);
    }
    match layout {
        Layout::InPlace => input.with_file_name(name),
        Layout::Mirror => {
            let rel_dir = input.strip_prefix(input_root).ok().and_then(|rel| rel.parent()).unwrap_or(Path::new(""));
            output_root.join(rel_dir).join(name)
        },
        Layout::Flat => output_root.join(name),
    }
}

fn canonical_inputs(config: &BatchConfig) -> ConvResult<(PathBuf, Vec<PathBuf>)> {
    let root = dunce::canonicalize(&config.input_root).map_err(|e| {
        log::error!("Input directory {} is not accessible: {}", config.input_root.display(), e);
        Error::Io(e)
    })?;
    let files = find_inputs(&root, config.recursive)?;
    Ok((root, files))
}

fn run_all(config: &BatchConfig, jobs: &[Job], summary: &mut BatchSummary, reporter: &mut dyn ProgressReporter) -> ConvResult<()> {
    let runner = config.parallelism.runner();
    run_jobs(jobs, config.workers, &*runner, |_, outcome| {
        summary.record(outcome);
        reporter.increase();
    })
}

/// Converts every input to a GIF. Individual failures are logged and counted, not returned.
pub fn convert_all(config: &BatchConfig, gif: &GifBatch, reporter: &mut dyn ProgressReporter) -> ConvResult<BatchSummary> {
    let (root, files) = canonical_inputs(config)?;
    if gif.layout != Layout::InPlace {
        fs::create_dir_all(&gif.output_root)?;
    }

    let mut summary = BatchSummary { total: files.len(), ..Default::default() };
    reporter.begin(files.len() as u64);

    let mut jobs = Vec::with_capacity(files.len());
    for input in files {
        let output = output_path(&input, &root, &gif.output_root, gif.layout, Some("gif"));
        if !config.overwrite && output.exists() {
            info!("Already exists, skipping {}", output.display());
            summary.skipped += 1;
            reporter.increase();
            continue;
        }
        jobs.push(Job::Convert(ConversionJob { input, output, settings: gif.settings }));
    }
    run_all(config, &jobs, &mut summary, reporter)?;

    let msg = format!("Done. Total: {}, converted: {}, skipped: {}", summary.total, summary.done, summary.skipped);
    info!("{msg}");
    reporter.done(&msg);
    Ok(summary)
}

/// Exports every input as a directory of PNG frames
pub fn export_all(config: &BatchConfig, png: &PngBatch, reporter: &mut dyn ProgressReporter) -> ConvResult<BatchSummary> {
    let (root, files) = canonical_inputs(config)?;
    if png.layout != Layout::InPlace {
        fs::create_dir_all(&png.output_root)?;
    }

    let mut summary = BatchSummary { total: files.len(), ..Default::default() };
    reporter.begin(files.len() as u64);

    let jobs: Vec<_> = files.into_iter().map(|input| {
        let target_dir = output_path(&input, &root, &png.output_root, png.layout, None);
        Job::Export(ExportJob { input, target_dir, overwrite: config.overwrite, include_static: png.include_static })
    }).collect();
    run_all(config, &jobs, &mut summary, reporter)?;

    let msg = format!("PNG export done. Total: {}, exported: {}, skipped: {}", summary.total, summary.done, summary.skipped);
    info!("{msg}");
    reporter.done(&msg);
    Ok(summary)
}
