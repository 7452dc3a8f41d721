//! Current database format: one JSON record per line
//!
//! ```text
//! {"predicate":"x : 1..10 & x > 5","labelling":[1200.0,-1.0],"source":"lift/Lift.mch","answers":["VALID","TIMEOUT"]}
//! ```
//!
//! Records are self-describing; `source` and `answers` are optional.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    write_atomically, DataGenerationStats, FormatId, PredicateDbFormat, PredicateSample,
    SampleStream, TrainingData,
};
use crate::backend::Answer;
use crate::{Error, Result};

/// Extension of current-format files.
pub const JSON_EXTENSION: &str = "jsonl";

#[derive(Serialize)]
struct RecordRef<'a> {
    predicate: &'a str,
    labelling: &'a [f64],
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a Path>,
    #[serde(skip_serializing_if = "no_answers")]
    answers: &'a [Answer],
}

fn no_answers(answers: &&[Answer]) -> bool {
    answers.is_empty()
}

#[derive(Deserialize)]
struct Record {
    predicate: String,
    labelling: Vec<f64>,
    #[serde(default)]
    source: Option<PathBuf>,
    #[serde(default)]
    answers: Vec<Answer>,
}

/// JSON-lines predicate database format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat {
    _private: (),
}

impl JsonFormat {
    /// Create the format.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    fn parse_line(file: &Path, index: usize, line: &str) -> Result<PredicateSample> {
        let corrupt = |reason: String| Error::FormatCorruption {
            file: file.to_path_buf(),
            line: index + 1,
            reason,
        };

        let record: Record = serde_json::from_str(line).map_err(|e| corrupt(e.to_string()))?;
        if !record.answers.is_empty() && record.answers.len() != record.labelling.len() {
            return Err(corrupt(format!(
                "{} answers for {} labels",
                record.answers.len(),
                record.labelling.len()
            )));
        }

        Ok(PredicateSample::new(record.predicate, record.labelling, record.source)
            .with_answers(record.answers))
    }
}

impl PredicateDbFormat for JsonFormat {
    fn id(&self) -> FormatId {
        FormatId::Json
    }

    fn file_extension(&self) -> &'static str {
        JSON_EXTENSION
    }

    fn load_samples(&self, file: &Path) -> Result<SampleStream> {
        let reader = BufReader::new(File::open(file).map_err(|e| Error::file_io(file, e))?);
        let path = file.to_path_buf();

        let records = reader
            .lines()
            .enumerate()
            .filter_map(move |(index, line)| match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(Self::parse_line(&path, index, &line)),
                Err(e) => Some(Err(Error::file_io(&path, e))),
            });

        Ok(SampleStream::new(records))
    }

    fn write_samples(
        &self,
        data: TrainingData,
        target_dir: &Path,
    ) -> Result<DataGenerationStats> {
        let target = self.target_path(data.relative_source(), target_dir);
        let source = data.absolute_source().to_path_buf();
        let mut samples = data.into_samples();

        let mut stats = write_atomically(&target, |writer| {
            let mut stats = DataGenerationStats::default();
            for sample in samples.by_ref() {
                if sample.labelling().iter().any(|label| !label.is_finite()) {
                    warn!(
                        source = %source.display(),
                        predicate = %sample.data(),
                        "skipping sample with non-finite label"
                    );
                    stats.increase_samples_failed(1);
                    continue;
                }

                let record = RecordRef {
                    predicate: sample.data(),
                    labelling: sample.labelling(),
                    source: sample.source(),
                    answers: sample.answers(),
                };
                serde_json::to_writer(&mut *writer, &record)?;
                writer
                    .write_all(b"\n")
                    .map_err(|e| Error::file_io(&target, e))?;
                stats.increase_samples_written();
            }

            match samples.take_error() {
                Some(e) => Err(e),
                None => Ok(stats),
            }
        })?;

        stats.increase_files_seen();
        stats.increase_files_created();
        stats.increase_samples_failed(samples.failed() as u64);
        debug!(
            target = %target.display(),
            written = stats.samples_written(),
            "wrote database file"
        );
        Ok(stats)
    }
}
