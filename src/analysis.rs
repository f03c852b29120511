//! Per-file analysis and the multi-file run loop

use crate::detection::{classify, AggregationState, IpCounter};
use crate::input::{ReadError, RecordReader};
use crate::models::FileReport;
use crate::output::{OutputError, OutputHandler};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while analyzing log files
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: ReadError,
    },

    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

/// Outcome of analyzing a set of log files
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    /// Source IP sightings across every processed file
    pub ip_counter: IpCounter,
}

/// Classify every record from `reader` into a fresh aggregation state
///
/// IP sightings are added to `ips`. On a read error the partial state is
/// discarded, but sightings already added to `ips` remain.
pub fn analyze_records<R: BufRead>(
    file_name: &str,
    reader: R,
    ips: &mut IpCounter,
) -> Result<FileReport, AnalysisError> {
    classify_all(file_name, RecordReader::new(reader), ips)
}

/// Analyze one log file on disk
pub fn analyze_file(path: &Path, ips: &mut IpCounter) -> Result<FileReport, AnalysisError> {
    let file_name = display_name(path);
    let records = RecordReader::open(path).map_err(|source| AnalysisError::Read {
        file: file_name.clone(),
        source,
    })?;

    classify_all(&file_name, records, ips)
}

fn classify_all<R: BufRead>(
    file_name: &str,
    records: RecordReader<R>,
    ips: &mut IpCounter,
) -> Result<FileReport, AnalysisError> {
    let mut state = AggregationState::new();

    for record in records {
        let record = record.map_err(|source| AnalysisError::Read {
            file: file_name.to_string(),
            source,
        })?;
        log::trace!(
            "{} {:?} {} from {:?}",
            file_name,
            record.event_time,
            record.action(),
            record.source_ip()
        );
        classify(&record, &mut state, ips);
    }

    log::info!("Classified {} records from {}", state.record_count(), file_name);
    Ok(state.into_report(file_name))
}

/// Analyze `files` in order, writing one report per file
///
/// A file that fails to parse is logged and skipped; the run continues with
/// the next one. Output errors abort the run.
pub fn run_analysis(files: &[PathBuf], output: &mut OutputHandler) -> Result<RunSummary, AnalysisError> {
    let mut summary = RunSummary::default();

    for path in files {
        log::info!("Analyzing {:?}", path);

        match analyze_file(path, &mut summary.ip_counter) {
            Ok(report) => {
                output.write_report(&report)?;
                summary.files_processed += 1;
            }
            Err(e) => {
                log::error!("{}", e);
                summary.files_failed += 1;
            }
        }
    }

    output.flush()?;
    log::info!(
        "Analyzed {} file(s), {} failed, {} distinct source IPs",
        summary.files_processed,
        summary.files_failed,
        summary.ip_counter.len()
    );

    Ok(summary)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
