//! Sequence I/O Module
//!
//! Streaming readers for biological sequence files. Supports FASTA and
//! FASTQ, including gzip-compressed FASTQ, behind a single record type.
//!
//! Framing is decided by the input file name's extension:
//! - `.fa` → FASTA
//! - `.gz` → gzip-compressed FASTQ
//! - anything else → plain FASTQ
//!
//! # Examples
//! ```no_run
//! use taxkit::seqio::SeqFile;
//!
//! let mut reader = SeqFile::open("reads.fastq.gz").unwrap();
//! while let Some(record) = reader.read_next().unwrap() {
//!     println!("{}: {} bp", record.name, record.seq.len());
//! }
//! ```

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::ToolError;

/// A sequence record: identifier plus nucleotide sequence.
///
/// Quality scores are never needed downstream, so FASTQ quality lines are
/// consumed and dropped during parsing.
#[derive(Debug, Clone)]
pub struct SeqRecord {
    /// Identifier (text after `>` or `@`, up to the first whitespace).
    pub name: String,
    /// Nucleotide sequence (may contain standard IUPAC codes).
    pub seq: String,
}

// ============================================================================
// FASTA Format
// ============================================================================

/// Sequential reader for FASTA files.
///
/// Reads records one at a time, concatenating multi-line sequences and
/// stripping trailing whitespace from each line.
pub struct FastaReader {
    reader: BufReader<File>,
    path: PathBuf,
    line_buf: String,
    current_name: Option<String>,
}

impl FastaReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open FASTA: {}", path.as_ref().display()))?;
        let mut reader = Self {
            reader: BufReader::with_capacity(1024 * 1024, file),
            path: path.as_ref().to_path_buf(),
            line_buf: String::with_capacity(256),
            current_name: None,
        };

        // Read first header line to initialise state
        reader.line_buf.clear();
        if reader.reader.read_line(&mut reader.line_buf)? > 0 {
            if !reader.line_buf.starts_with('>') {
                return Err(ToolError::input_format(
                    &reader.path,
                    "FASTA file does not start with '>'",
                )
                .into());
            }
            reader.current_name = Some(
                reader.line_buf[1..]
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_string(),
            );
        }

        Ok(reader)
    }

    /// Reads the next record, or `Ok(None)` at end of file.
    pub fn read_next(&mut self) -> Result<Option<SeqRecord>> {
        let name = match self.current_name.take() {
            Some(n) => n,
            None => return Ok(None),
        };

        let mut seq = String::with_capacity(1024);

        loop {
            self.line_buf.clear();
            if self.reader.read_line(&mut self.line_buf)? == 0 {
                break;
            }

            if self.line_buf.starts_with('>') {
                // New record header encountered
                self.current_name = Some(
                    self.line_buf[1..]
                        .split_whitespace()
                        .next()
                        .unwrap_or("")
                        .to_string(),
                );
                break;
            } else {
                seq.push_str(self.line_buf.trim_end());
            }
        }

        Ok(Some(SeqRecord { name, seq }))
    }
}

// ============================================================================
// FASTQ Format
// ============================================================================

/// Generic FASTQ reader over any byte source.
///
/// Use `FastqReader<File>` for plain files or
/// `FastqReader<MultiGzDecoder<File>>` for gzipped files.
pub struct FastqReader<R: Read> {
    reader: BufReader<R>,
    path: PathBuf,
    line_buf: String,
}

impl FastqReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open FASTQ: {}", path.as_ref().display()))?;
        Ok(Self {
            reader: BufReader::with_capacity(1024 * 1024, file),
            path: path.as_ref().to_path_buf(),
            line_buf: String::with_capacity(512),
        })
    }
}

impl FastqReader<MultiGzDecoder<File>> {
    pub fn open_gz<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open FASTQ.gz: {}", path.as_ref().display()))?;
        let decoder = MultiGzDecoder::new(file);
        Ok(Self {
            reader: BufReader::with_capacity(1024 * 1024, decoder),
            path: path.as_ref().to_path_buf(),
            line_buf: String::with_capacity(512),
        })
    }
}

impl<R: Read> FastqReader<R> {
    /// Reads the next 4-line FASTQ record (`@name` / sequence / `+` /
    /// quality). The quality line is consumed but not kept.
    pub fn read_next(&mut self) -> Result<Option<SeqRecord>> {
        // Line 1: @name
        self.line_buf.clear();
        if self.reader.read_line(&mut self.line_buf)? == 0 {
            return Ok(None);
        }
        if self.line_buf.trim_end().is_empty() {
            return Ok(None);
        }
        if !self.line_buf.starts_with('@') {
            return Err(ToolError::input_format(
                &self.path,
                format!(
                    "FASTQ header line does not start with '@': {}",
                    self.line_buf.trim_end()
                ),
            )
            .into());
        }
        let name = self.line_buf[1..]
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string();

        // Line 2: sequence
        self.line_buf.clear();
        if self.reader.read_line(&mut self.line_buf)? == 0 {
            return Err(
                ToolError::input_format(&self.path, "Truncated FASTQ record (no sequence line)")
                    .into(),
            );
        }
        let seq = self.line_buf.trim_end().to_string();

        // Line 3: + separator
        self.line_buf.clear();
        if self.reader.read_line(&mut self.line_buf)? == 0 || !self.line_buf.starts_with('+') {
            return Err(
                ToolError::input_format(&self.path, "Truncated FASTQ record (no '+' separator)")
                    .into(),
            );
        }

        // Line 4: quality scores, discarded
        self.line_buf.clear();
        self.reader.read_line(&mut self.line_buf)?;

        Ok(Some(SeqRecord { name, seq }))
    }
}

// ============================================================================
// Unified, extension-dispatching reader
// ============================================================================

/// Sequence file reader with framing decided by the file extension.
///
/// `.fa` files are parsed as FASTA, `.gz` files as gzip-compressed FASTQ,
/// and everything else as plain FASTQ. The input file is owned by the
/// reader and closed on drop, on every exit path.
pub enum SeqFile {
    Fasta(FastaReader),
    Fastq(FastqReader<File>),
    FastqGz(FastqReader<MultiGzDecoder<File>>),
}

impl SeqFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext {
            "fa" => Ok(SeqFile::Fasta(FastaReader::open(path)?)),
            "gz" => Ok(SeqFile::FastqGz(FastqReader::open_gz(path)?)),
            _ => Ok(SeqFile::Fastq(FastqReader::open(path)?)),
        }
    }

    /// Reads the next record regardless of framing.
    pub fn read_next(&mut self) -> Result<Option<SeqRecord>> {
        match self {
            SeqFile::Fasta(r) => r.read_next(),
            SeqFile::Fastq(r) => r.read_next(),
            SeqFile::FastqGz(r) => r.read_next(),
        }
    }
}

impl Iterator for SeqFile {
    type Item = Result<SeqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
