//! Local batch runner.
//!
//! Builds the feature index once, splits the point input into batches of
//! records, classifies every batch independently on a rayon pool and merges
//! the partial counts. The merge order is whatever the pool produces.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::iter::{ParallelBridge, ParallelIterator};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::aggregate::CountTable;
use crate::config::{JobConfig, RecordConfig};
use crate::emit::{normalize_fields, Emitter, RecordOutcome};
use crate::error::DensityError;
use crate::parser::{load_features, FeatureSource, FileSource};
use crate::pip::FeatureIndex;

/// Per-outcome record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    pub records: u64,
    pub emitted: u64,
    pub outside: u64,
    pub unparsable: u64,
    pub filtered: u64,
}

impl RecordStats {
    fn record(&mut self, outcome: &RecordOutcome) {
        self.records += 1;
        match outcome {
            RecordOutcome::Unparsable => self.unparsable += 1,
            RecordOutcome::Filtered => self.filtered += 1,
            RecordOutcome::Emitted { feature, .. } => {
                self.emitted += 1;
                if feature.is_none() {
                    self.outside += 1;
                }
            }
        }
    }

    fn merge(self, other: RecordStats) -> RecordStats {
        RecordStats {
            records: self.records + other.records,
            emitted: self.emitted + other.emitted,
            outside: self.outside + other.outside,
            unparsable: self.unparsable + other.unparsable,
            filtered: self.filtered + other.filtered,
        }
    }
}

/// Combined output of one or more batches
#[derive(Debug, Clone, Default)]
pub struct Partial {
    pub counts: CountTable,
    pub stats: RecordStats,
}

impl Partial {
    pub fn merge(self, other: Partial) -> Partial {
        Partial {
            counts: self.counts.merge(other.counts),
            stats: self.stats.merge(other.stats),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobSummary {
    pub features: usize,
    pub input_files: usize,
    pub stats: RecordStats,
    pub labels: usize,
    pub output_path: PathBuf,
}

/// Parse the polygon source and build the index.
///
/// A source that yields no features is an error unless `allow_empty` is set,
/// in which case every point will be reported outside.
pub fn prepare_index<S: FeatureSource + ?Sized>(
    source: &S,
    allow_empty: bool,
) -> crate::error::Result<FeatureIndex> {
    let features = load_features(source)?;

    if features.is_empty() {
        if !allow_empty {
            return Err(DensityError::NoFeatures {
                source_name: source.describe(),
            });
        }
        warn!("Continuing with an empty polygon set; every point will be reported outside");
    }

    Ok(FeatureIndex::build(features))
}

/// Run the whole job described by `config`
pub fn run(config: &JobConfig) -> Result<JobSummary> {
    config.validate()?;

    let index = prepare_index(
        &FileSource::new(&config.polygons_path),
        config.allow_empty_polygons,
    )
    .context("Failed to initialize polygon index")?;

    let inputs = discover_inputs(&config.points_path)?;
    info!(
        "Processing {} input file(s) from {}",
        inputs.len(),
        config.points_path.display()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or(0))
        .build()
        .context("Failed to build worker pool")?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} records ({per_sec})")?,
    );

    let mut total = Partial::default();
    for path in &inputs {
        debug!("Reading {}", path.display());
        let reader = open_input(path)?;
        let partial = pool
            .install(|| count_records(&index, &config.record, reader, config.batch_size, &pb))
            .with_context(|| format!("Failed to read points from {}", path.display()))?;
        total = total.merge(partial);
    }

    pb.finish_and_clear();

    write_output(&total.counts, &config.output_path, &config.separator)?;

    let summary = JobSummary {
        features: index.features().len(),
        input_files: inputs.len(),
        stats: total.stats,
        labels: total.counts.len(),
        output_path: config.output_path.clone(),
    };

    info!(
        "Read {} records: {} emitted ({} outside polygons), {} unparsable, {} filtered",
        summary.stats.records,
        summary.stats.emitted,
        summary.stats.outside,
        summary.stats.unparsable,
        summary.stats.filtered
    );
    info!(
        "Wrote {} labels to {}",
        summary.labels,
        summary.output_path.display()
    );

    Ok(summary)
}

/// Classify every record from `reader` in parallel batches.
///
/// Runs on the current rayon pool; call it inside `ThreadPool::install` to
/// pick a specific one.
pub fn count_records<R: Read + Send>(
    index: &FeatureIndex,
    config: &RecordConfig,
    reader: R,
    batch_size: usize,
    progress: &ProgressBar,
) -> Result<Partial> {
    let emitter = Emitter::new(index, config);

    let batches = Batches {
        reader: ReaderBuilder::new()
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_reader(reader),
        batch_size: batch_size.max(1),
        done: false,
    };

    batches
        .par_bridge()
        .map(|batch| -> Result<Partial> {
            let batch = batch?;
            let partial = process_batch(&emitter, &batch);
            progress.inc(batch.len() as u64);
            Ok(partial)
        })
        .try_reduce(Partial::default, |a, b| Ok(a.merge(b)))
}

/// Combine step: one batch into one partial table
fn process_batch(emitter: &Emitter<'_>, batch: &[ByteRecord]) -> Partial {
    let mut partial = Partial::default();

    for record in batch {
        let outcome = emitter.evaluate(&decode_fields(record));
        partial.stats.record(&outcome);
        if let RecordOutcome::Emitted { label, .. } = outcome {
            partial.counts.add(&label, 1);
        }
    }

    partial
}

/// Invalid UTF-8 is replaced with U+FFFD, so only the fields it touches
/// can fail to parse.
fn decode_fields(record: &ByteRecord) -> Vec<String> {
    let raw: Vec<Cow<'_, str>> = record.iter().map(String::from_utf8_lossy).collect();
    normalize_fields(raw.iter().map(|field| &**field))
}

/// Groups csv records into fixed-size work units
struct Batches<R> {
    reader: csv::Reader<R>,
    batch_size: usize,
    done: bool,
}

impl<R: Read> Iterator for Batches<R> {
    type Item = csv::Result<Vec<ByteRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        let mut record = ByteRecord::new();
        while batch.len() < self.batch_size {
            match self.reader.read_byte_record(&mut record) {
                Ok(true) => batch.push(record.clone()),
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        (!batch.is_empty()).then_some(Ok(batch))
    }
}

/// Files are skipped when their name starts with `.` or `_`
fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map_or(false, |name| name.starts_with('.') || name.starts_with('_'))
}

/// Expand the points path into the list of files to read, sorted by name
pub fn discover_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("Points input {} does not exist", path.display());
    }

    let mut inputs = Vec::new();
    for entry in WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = entry.with_context(|| format!("Failed to list {}", path.display()))?;
        if entry.file_type().is_file() {
            inputs.push(entry.into_path());
        }
    }

    if inputs.is_empty() {
        anyhow::bail!("No input files found under {}", path.display());
    }
    Ok(inputs)
}

/// Open a points file, decompressing `.gz` files
pub fn open_input(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader: Box<dyn Read + Send> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Write the final table, creating parent directories as needed
pub fn write_output(counts: &CountTable, path: &Path, separator: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    counts
        .write_to(BufWriter::new(file), separator)
        .with_context(|| format!("Failed to write {}", path.display()))
}
