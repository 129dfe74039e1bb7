//! K-mer counting and frequency filtering.
//!
//! Scans a sequence file, tallies every fixed-length window that starts with
//! a configured prefix (over the forward sequence and its reverse
//! complement), drops entries below a minimum frequency, and writes the
//! survivors as a FASTA-like file: a single `>from_file <input>` header line
//! followed by one k-mer per line.

use anyhow::Result;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::Path;

use crate::error::ToolError;
use crate::seqio::SeqFile;

/// Returns the reverse complement of a nucleotide sequence.
///
/// Order is reversed and A↔T / C↔G are swapped, preserving case.
/// Any other character (N, IUPAC ambiguity codes, ...) passes through
/// unchanged.
pub fn reverse_complement(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|c| match c {
            'A' => 'T',
            'T' => 'A',
            'G' => 'C',
            'C' => 'G',
            'a' => 't',
            't' => 'a',
            'g' => 'c',
            'c' => 'g',
            other => other,
        })
        .collect()
}

/// Accumulating frequency table for prefixed k-mers.
///
/// An owned value threaded through the scan step; the filter step consumes
/// it, so each pipeline stage can be tested in isolation.
#[derive(Debug, Default, Clone)]
pub struct KmerCounts {
    counts: FxHashMap<String, u64>,
    scanned: u64,
}

impl KmerCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tallies every k-length window of `seq` that starts with `prefix`.
    ///
    /// A sequence shorter than k contributes zero windows. A prefix longer
    /// than k can never match, yielding an empty result rather than an
    /// error.
    pub fn count_sequence(&mut self, seq: &str, prefix: &str, k: usize) {
        if k == 0 || seq.len() < k {
            return;
        }
        for i in 0..=(seq.len() - k) {
            let window = &seq[i..i + k];
            if window.starts_with(prefix) {
                self.scanned += 1;
                *self.counts.entry(window.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Tallies one record in both orientations: a forward window pass,
    /// then an independent pass over the reverse complement.
    pub fn count_record(&mut self, seq: &str, prefix: &str, k: usize) {
        self.count_sequence(seq, prefix, k);
        self.count_sequence(&reverse_complement(seq), prefix, k);
    }

    /// Total number of prefix-matching windows seen (informational).
    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    /// Number of distinct k-mers currently tallied.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn get(&self, kmer: &str) -> Option<u64> {
        self.counts.get(kmer).copied()
    }

    pub fn into_counts(self) -> FxHashMap<String, u64> {
        self.counts
    }
}

/// Drops every entry with a count strictly below `min_freq`.
///
/// Pure transform producing a new map: entries equal to the threshold are
/// kept, so re-filtering an already-filtered map is a no-op.
pub fn filter_kmers(counts: FxHashMap<String, u64>, min_freq: u64) -> FxHashMap<String, u64> {
    counts.into_iter().filter(|(_, n)| *n >= min_freq).collect()
}

/// Configuration for one k-mer filtering run.
pub struct KmerFilter {
    pub prefix: String,
    pub k: usize,
    pub min_freq: u64,
    pub verbose: bool,
}

impl KmerFilter {
    /// Runs the full pipeline: scan `input` → count both orientations →
    /// threshold filter → write survivors to `output`.
    ///
    /// The output is rendered fully in memory and written in one call, so a
    /// failed run never leaves a half-written output file.
    pub fn run(&self, input: &Path, output: &Path) -> Result<()> {
        let mut reader = SeqFile::open(input)?;
        let mut counts = KmerCounts::new();
        let mut num_records = 0u64;

        while let Some(record) = reader.read_next()? {
            counts.count_record(&record.seq, &self.prefix, self.k);
            num_records += 1;
        }

        if self.verbose {
            eprintln!(
                "Scanned {} records: {} prefixed k-mers, {} distinct",
                num_records,
                counts.scanned(),
                counts.distinct()
            );
        }

        let surviving = filter_kmers(counts.into_counts(), self.min_freq);

        if self.verbose {
            eprintln!(
                "K-mers with frequency >= {}: {}",
                self.min_freq,
                surviving.len()
            );
        }

        let mut out = String::with_capacity(16 + surviving.len() * (self.k + 1));
        out.push_str(&format!(">from_file {}\n", input.display()));
        for kmer in surviving.keys() {
            out.push_str(kmer);
            out.push('\n');
        }

        fs::write(output, out).map_err(|e| ToolError::file_write(output, e))?;

        Ok(())
    }
}
