//! Species recall evaluation.
//!
//! Joins a ground-truth species assignment table against a classifier's
//! prediction table on the assembly accession, marks each joined row
//! correct or incorrect by exact species-name equality, and breaks the
//! incorrect rows down into no-calls, genus-only calls, and wrong-species
//! calls. Every incorrect row falls into exactly one of those classes.

use anyhow::Result;
use csv::{ReaderBuilder, WriterBuilder};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ToolError;

/// One ground-truth row: which species an assembly really is.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessionRecord {
    pub uuid: String,
    pub species_taxid: String,
    pub assembly_accession: String,
    /// Free text; may carry a trailing "subspecies N" suffix.
    pub species: String,
}

/// One classifier output row. An empty `predicted.name` cell means the
/// classifier made no call for this query.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRecord {
    pub query: String,
    #[serde(rename = "predicted.name")]
    pub predicted_name: Option<String>,
    #[serde(rename = "predicted.rank")]
    pub predicted_rank: Option<String>,
    #[serde(rename = "predicted.ncbi_id")]
    pub predicted_ncbi_id: Option<String>,
    #[serde(rename = "predicted.threshold")]
    pub predicted_threshold: Option<f64>,
    #[serde(rename = "closest.distance")]
    pub closest_distance: Option<f64>,
    #[serde(rename = "next.name")]
    pub next_name: Option<String>,
    #[serde(rename = "next.rank")]
    pub next_rank: Option<String>,
    #[serde(rename = "next.ncbi_id")]
    pub next_ncbi_id: Option<String>,
    #[serde(rename = "next.threshold")]
    pub next_threshold: Option<f64>,
}

/// Ground truth joined to a prediction on the accession key.
#[derive(Debug, Clone)]
pub struct JoinedRow {
    /// Normalized ground-truth species (subspecies suffix stripped).
    pub species: String,
    pub predicted_name: Option<String>,
    pub assembly_accession: String,
    pub next_name: Option<String>,
    pub correct: bool,
}

impl JoinedRow {
    /// First whitespace-delimited token of the ground-truth species.
    pub fn actual_genus(&self) -> &str {
        self.species.split_whitespace().next().unwrap_or("")
    }
}

/// Structured summary of one evaluation run.
///
/// All percentages are computed against `num_samples`, the prediction-table
/// row count before the join.
#[derive(Debug, Clone)]
pub struct RecallReport {
    /// Distinct normalized species among the joined rows.
    pub num_species: usize,
    /// Rows in the predictions table before the join.
    pub num_samples: usize,
    /// Rows surviving the inner join (unmatched keys are dropped silently).
    pub num_joined: usize,
    pub num_correct: usize,
    /// Incorrect rows with no prediction at all.
    pub no_calls: usize,
    /// No-call rows whose `next.name` matches the actual genus.
    pub no_call_genus_matches: usize,
    /// No-call rows where not even the next-best genus matches.
    pub no_call_incorrect_genus: usize,
    /// Incorrect rows with a single-word (genus-level) prediction.
    pub genus_only_calls: usize,
    /// Genus-only calls naming the right genus.
    pub genus_only_correct: usize,
    /// Genus-only calls naming the wrong genus.
    pub genus_only_incorrect: usize,
    /// Incorrect rows where a full (wrong) binomial was predicted.
    pub incorrect_species_calls: usize,
    /// The residual wrong-binomial rows, for display.
    pub incorrect_species_rows: Vec<JoinedRow>,
}

impl RecallReport {
    /// Percentage of total samples, as a raw float.
    pub fn pct(&self, count: usize) -> f64 {
        if self.num_samples == 0 {
            0.0
        } else {
            count as f64 / self.num_samples as f64 * 100.0
        }
    }

    /// Renders the report to stdout in the historical line-per-metric shape.
    pub fn print_summary(&self) {
        println!("Number of species: {}", self.num_species);
        println!("Number of samples: {}", self.num_samples);
        println!(
            "Correct species calls: {}\t({}%)",
            self.num_correct,
            self.pct(self.num_correct)
        );
        println!(
            "Number of no calls: {}\t({}%)",
            self.no_calls,
            self.pct(self.no_calls)
        );
        println!(
            "Number of no calls where genus matches in next: {}\t({}%)",
            self.no_call_genus_matches,
            self.pct(self.no_call_genus_matches)
        );
        println!(
            "Number of no calls with incorrect genus: {}\t({}%)",
            self.no_call_incorrect_genus,
            self.pct(self.no_call_incorrect_genus)
        );
        println!(
            "Number of genus only calls: {}\t({}%)",
            self.genus_only_correct,
            self.pct(self.genus_only_correct)
        );
        println!(
            "Number of genus only calls with incorrect genus: {}\t({}%)",
            self.genus_only_incorrect,
            self.pct(self.genus_only_incorrect)
        );
        println!(
            "Number of incorrect species calls: {}\t({}%)",
            self.incorrect_species_calls,
            self.pct(self.incorrect_species_calls)
        );
        for row in &self.incorrect_species_rows {
            println!(
                "{}\t{}\t{}\t{}",
                row.species,
                row.predicted_name.as_deref().unwrap_or(""),
                row.assembly_accession,
                row.next_name.as_deref().unwrap_or("")
            );
        }
    }
}

/// Strips a trailing " subspecies <digits>" suffix from a species name.
///
/// The token is case-sensitive; anything else is returned unchanged.
pub fn normalize_species(species: &str) -> &str {
    const TOKEN: &str = " subspecies";
    if let Some(idx) = species.rfind(TOKEN) {
        let tail = &species[idx + TOKEN.len()..];
        let digits = tail.trim_start();
        if digits.len() < tail.len()
            && !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
        {
            return &species[..idx];
        }
    }
    species
}

/// The recall evaluation pipeline.
pub struct RecallEvaluator {
    pub verbose: bool,
}

impl RecallEvaluator {
    /// Loads both tables, joins them on the accession key, writes the joined
    /// rows to `output` and the incorrect rows to `output + ".differences.csv"`,
    /// and returns the structured summary.
    pub fn compare(
        &self,
        ground_truth: &Path,
        predictions: &Path,
        output: &Path,
    ) -> Result<RecallReport> {
        let metadata = load_accessions(ground_truth)?;
        let prediction_rows = load_predictions(predictions)?;
        let num_samples = prediction_rows.len();

        if self.verbose {
            eprintln!(
                "Loaded {} ground-truth rows, {} prediction rows",
                metadata.len(),
                num_samples
            );
        }

        let joined = join_rows(&metadata, &prediction_rows);

        if self.verbose && joined.len() < num_samples {
            eprintln!(
                "{} prediction rows had no matching accession and were dropped",
                num_samples - joined.len()
            );
        }

        write_joined(&joined, output)?;

        let mut incorrect: Vec<&JoinedRow> = joined.iter().filter(|r| !r.correct).collect();
        incorrect.sort_by(|a, b| a.species.cmp(&b.species));
        write_differences(&incorrect, output)?;

        let report = build_report(&joined, &incorrect, num_samples);
        Ok(report)
    }
}

fn load_accessions(path: &Path) -> Result<Vec<AccessionRecord>> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .map_err(|e| ToolError::input_format(path, e.to_string()))?;

    require_columns(
        &mut reader,
        path,
        &["uuid", "species_taxid", "assembly_accession", "species"],
    )?;

    let mut rows = Vec::new();
    for (i, result) in reader.deserialize().enumerate() {
        let mut record: AccessionRecord = result.map_err(|e| {
            ToolError::input_format(path, format!("row {}: {}", i + 2, e))
        })?;
        record.species = normalize_species(&record.species).to_string();
        rows.push(record);
    }
    Ok(rows)
}

fn load_predictions(path: &Path) -> Result<Vec<PredictionRecord>> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .map_err(|e| ToolError::input_format(path, e.to_string()))?;

    require_columns(&mut reader, path, &["query", "predicted.name", "next.name"])?;

    let mut rows = Vec::new();
    for (i, result) in reader.deserialize().enumerate() {
        let record: PredictionRecord = result.map_err(|e| {
            ToolError::input_format(path, format!("row {}: {}", i + 2, e))
        })?;
        rows.push(record);
    }
    Ok(rows)
}

fn require_columns(
    reader: &mut csv::Reader<fs::File>,
    path: &Path,
    required: &[&str],
) -> Result<()> {
    let headers = reader
        .headers()
        .map_err(|e| ToolError::input_format(path, e.to_string()))?;
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(ToolError::input_format(path, format!("missing column '{column}'")).into());
        }
    }
    Ok(())
}

/// Inner join on `assembly_accession == query`, in ground-truth row order.
/// Rows with no match on either side are dropped.
fn join_rows(metadata: &[AccessionRecord], predictions: &[PredictionRecord]) -> Vec<JoinedRow> {
    let by_query: FxHashMap<&str, &PredictionRecord> = predictions
        .iter()
        .map(|p| (p.query.as_str(), p))
        .collect();

    metadata
        .iter()
        .filter_map(|m| {
            let pred = by_query.get(m.assembly_accession.as_str())?;
            let correct = pred
                .predicted_name
                .as_deref()
                .is_some_and(|name| name == m.species);
            Some(JoinedRow {
                species: m.species.clone(),
                predicted_name: pred.predicted_name.clone(),
                assembly_accession: m.assembly_accession.clone(),
                next_name: pred.next_name.clone(),
                correct,
            })
        })
        .collect()
}

fn write_joined(joined: &[JoinedRow], output: &Path) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(["species", "predicted.name", "assembly_accession"])
        .map_err(csv_io_err)
        .map_err(|e| ToolError::file_write(output, e))?;
    for row in joined {
        writer
            .write_record([
                row.species.as_str(),
                row.predicted_name.as_deref().unwrap_or(""),
                row.assembly_accession.as_str(),
            ])
            .map_err(csv_io_err)
            .map_err(|e| ToolError::file_write(output, e))?;
    }
    emit(writer, output)
}

fn write_differences(incorrect: &[&JoinedRow], output: &Path) -> Result<()> {
    let path = PathBuf::from(format!("{}.differences.csv", output.display()));

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(["species", "predicted.name", "assembly_accession", "next.name"])
        .map_err(csv_io_err)
        .map_err(|e| ToolError::file_write(&path, e))?;
    for row in incorrect {
        writer
            .write_record([
                row.species.as_str(),
                row.predicted_name.as_deref().unwrap_or(""),
                row.assembly_accession.as_str(),
                row.next_name.as_deref().unwrap_or(""),
            ])
            .map_err(csv_io_err)
            .map_err(|e| ToolError::file_write(&path, e))?;
    }
    emit(writer, &path)
}

// Build the whole file in memory, then write once.
fn emit(writer: csv::Writer<Vec<u8>>, path: &Path) -> Result<()> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ToolError::file_write(path, std::io::Error::other(e.to_string())))?;
    fs::write(path, bytes).map_err(|e| ToolError::file_write(path, e))?;
    Ok(())
}

fn csv_io_err(e: csv::Error) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

fn build_report(
    joined: &[JoinedRow],
    incorrect: &[&JoinedRow],
    num_samples: usize,
) -> RecallReport {
    let num_species = joined
        .iter()
        .map(|r| r.species.as_str())
        .collect::<FxHashSet<_>>()
        .len();
    let num_correct = joined.iter().filter(|r| r.correct).count();

    // Stage a: no prediction at all
    let no_call_rows: Vec<&&JoinedRow> = incorrect
        .iter()
        .filter(|r| r.predicted_name.is_none())
        .collect();
    let no_calls = no_call_rows.len();
    let no_call_genus_matches = no_call_rows
        .iter()
        .filter(|r| r.next_name.as_deref() == Some(r.actual_genus()))
        .count();
    let no_call_incorrect_genus = no_calls - no_call_genus_matches;

    // Stage b: single-word predictions, interpreted as genus-level calls
    let genus_only_rows: Vec<&&JoinedRow> = incorrect
        .iter()
        .filter(|r| {
            r.predicted_name
                .as_deref()
                .is_some_and(|name| !name.chars().any(char::is_whitespace))
        })
        .collect();
    let genus_only_calls = genus_only_rows.len();
    let genus_only_correct = genus_only_rows
        .iter()
        .filter(|r| r.predicted_name.as_deref() == Some(r.actual_genus()))
        .count();
    let genus_only_incorrect = genus_only_calls - genus_only_correct;

    // Stage c: a full binomial was predicted, but the wrong one
    let incorrect_species_rows: Vec<JoinedRow> = incorrect
        .iter()
        .filter(|r| {
            r.predicted_name
                .as_deref()
                .is_some_and(|name| name.chars().any(char::is_whitespace))
        })
        .map(|r| (**r).clone())
        .collect();

    RecallReport {
        num_species,
        num_samples,
        num_joined: joined.len(),
        num_correct,
        no_calls,
        no_call_genus_matches,
        no_call_incorrect_genus,
        genus_only_calls,
        genus_only_correct,
        genus_only_incorrect,
        incorrect_species_calls: incorrect_species_rows.len(),
        incorrect_species_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accession(acc: &str, species: &str) -> AccessionRecord {
        AccessionRecord {
            uuid: acc.to_string(),
            species_taxid: "1".to_string(),
            assembly_accession: acc.to_string(),
            species: species.to_string(),
        }
    }

    fn prediction(query: &str, name: Option<&str>, next: Option<&str>) -> PredictionRecord {
        PredictionRecord {
            query: query.to_string(),
            predicted_name: name.map(str::to_string),
            predicted_rank: None,
            predicted_ncbi_id: None,
            predicted_threshold: None,
            closest_distance: None,
            next_name: next.map(str::to_string),
            next_rank: None,
            next_ncbi_id: None,
            next_threshold: None,
        }
    }

    #[test]
    fn test_normalize_species() {
        assert_eq!(normalize_species("Foo bar subspecies 12"), "Foo bar");
        assert_eq!(normalize_species("Foo bar subspecies 1"), "Foo bar");
        assert_eq!(normalize_species("Foo bar"), "Foo bar");
        // Token must be followed by digits
        assert_eq!(
            normalize_species("Foo bar subspecies alpha"),
            "Foo bar subspecies alpha"
        );
        // Case-sensitive token
        assert_eq!(
            normalize_species("Foo bar Subspecies 2"),
            "Foo bar Subspecies 2"
        );
    }

    #[test]
    fn test_join_drops_unmatched_rows() {
        let metadata = vec![
            accession("A1", "Legionella pneumophila"),
            accession("A2", "Coxiella burnetii"),
            accession("A3", "Unmatched species"),
        ];
        let predictions = vec![
            prediction("A1", Some("Legionella pneumophila"), None),
            prediction("A2", Some("Coxiella"), None),
            prediction("A9", Some("Nowhere"), None),
        ];

        let joined = join_rows(&metadata, &predictions);
        assert_eq!(joined.len(), 2);
        assert!(joined.len() <= metadata.len().min(predictions.len()));
        assert!(joined[0].correct);
        assert!(!joined[1].correct);
    }

    #[test]
    fn test_null_prediction_is_never_correct() {
        let metadata = vec![accession("A1", "Legionella pneumophila")];
        let predictions = vec![prediction("A1", None, Some("Legionella"))];
        let joined = join_rows(&metadata, &predictions);
        assert!(!joined[0].correct);
    }

    #[test]
    fn test_cascade_partitions_incorrect_rows() {
        let metadata = vec![
            accession("A1", "Legionella pneumophila"),
            accession("A2", "Coxiella burnetii"),
            accession("A3", "Bacillus cereus"),
            accession("A4", "Vibrio cholerae"),
        ];
        let predictions = vec![
            // no call, next matches genus
            prediction("A1", None, Some("Legionella")),
            // genus-only, correct genus
            prediction("A2", Some("Coxiella"), None),
            // genus-only, wrong genus
            prediction("A3", Some("Vibrio"), None),
            // full binomial, wrong species
            prediction("A4", Some("Vibrio vulnificus"), None),
        ];

        let joined = join_rows(&metadata, &predictions);
        let incorrect: Vec<&JoinedRow> = joined.iter().filter(|r| !r.correct).collect();
        let report = build_report(&joined, &incorrect, predictions.len());

        assert_eq!(report.no_calls, 1);
        assert_eq!(report.no_call_genus_matches, 1);
        assert_eq!(report.no_call_incorrect_genus, 0);
        assert_eq!(report.genus_only_calls, 2);
        assert_eq!(report.genus_only_correct, 1);
        assert_eq!(report.genus_only_incorrect, 1);
        assert_eq!(report.incorrect_species_calls, 1);

        // Every incorrect row is in exactly one class
        assert_eq!(
            report.no_calls + report.genus_only_calls + report.incorrect_species_calls,
            incorrect.len()
        );
    }

    #[test]
    fn test_genus_only_prediction_classified_end_to_end() {
        let metadata = vec![
            accession("A1", "Legionella pneumophila"),
            accession("A2", "Coxiella burnetii"),
        ];
        let predictions = vec![
            prediction("A1", Some("Legionella pneumophila"), None),
            prediction("A2", Some("Coxiella"), None),
        ];

        let joined = join_rows(&metadata, &predictions);
        let incorrect: Vec<&JoinedRow> = joined.iter().filter(|r| !r.correct).collect();
        let report = build_report(&joined, &incorrect, predictions.len());

        assert_eq!(report.num_correct, 1);
        assert_eq!(incorrect.len(), 1);
        assert_eq!(incorrect[0].species, "Coxiella burnetii");
        assert_eq!(incorrect[0].predicted_name.as_deref(), Some("Coxiella"));
        assert_eq!(report.genus_only_calls, 1);
        assert_eq!(report.genus_only_correct, 1);
    }

    #[test]
    fn test_pct_against_samples_before_join() {
        let report = RecallReport {
            num_species: 1,
            num_samples: 4,
            num_joined: 2,
            num_correct: 1,
            no_calls: 0,
            no_call_genus_matches: 0,
            no_call_incorrect_genus: 0,
            genus_only_calls: 0,
            genus_only_correct: 0,
            genus_only_incorrect: 0,
            incorrect_species_calls: 1,
            incorrect_species_rows: Vec::new(),
        };
        assert_eq!(report.pct(report.num_correct), 25.0);
    }

    #[test]
    fn test_compare_writes_both_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let gt = dir.path().join("metadata.csv");
        let pred = dir.path().join("results.csv");
        let out = dir.path().join("comparison.csv");

        fs::write(
            &gt,
            "uuid,species_taxid,assembly_accession,species\n\
             GCA_1,1,GCA_1,Legionella pneumophila subspecies 2\n\
             GCA_2,2,GCA_2,Coxiella burnetii\n",
        )
        .unwrap();
        fs::write(
            &pred,
            "query,predicted.name,predicted.rank,predicted.ncbi_id,predicted.threshold,\
             closest.distance,closest.description,next.name,next.rank,next.ncbi_id,next.threshold\n\
             GCA_1,Legionella pneumophila,species,1,1.0,0.0,,,,,\n\
             GCA_2,,species,2,0.9998,0.0,,Coxiella,,,\n",
        )
        .unwrap();

        let evaluator = RecallEvaluator { verbose: false };
        let report = evaluator.compare(&gt, &pred, &out).unwrap();

        assert_eq!(report.num_samples, 2);
        assert_eq!(report.num_joined, 2);
        // Subspecies suffix stripped before comparison
        assert_eq!(report.num_correct, 1);
        assert_eq!(report.no_calls, 1);
        assert_eq!(report.no_call_genus_matches, 1);

        let main_out = fs::read_to_string(&out).unwrap();
        assert!(main_out.starts_with("species,predicted.name,assembly_accession\n"));
        assert!(main_out.contains("Legionella pneumophila,Legionella pneumophila,GCA_1"));

        let diff_out =
            fs::read_to_string(dir.path().join("comparison.csv.differences.csv")).unwrap();
        assert!(diff_out.contains("Coxiella burnetii,,GCA_2,Coxiella"));
    }

    #[test]
    fn test_missing_column_is_input_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let gt = dir.path().join("metadata.csv");
        fs::write(&gt, "uuid,assembly_accession\nGCA_1,GCA_1\n").unwrap();

        let err = load_accessions(&gt).unwrap_err();
        assert!(err.to_string().contains("species"));
    }
}
