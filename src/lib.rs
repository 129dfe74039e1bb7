//! taxkit - Sequence classification evaluation and preparation utilities
//!
//! Two independent batch pipelines:
//! - recall evaluation: join a ground-truth species table against a
//!   classifier's predictions and break the errors down by class
//! - k-mer filtering: count prefixed fixed-length substrings across a
//!   sequence file (both orientations) and keep the frequent ones
//!
//! # Modules
//! - `seqio`: FASTA/FASTQ file I/O with gzip support
//! - `recall`: species recall evaluation over CSV tables
//! - `kmer`: k-mer counting, thresholding, and output
//! - `error`: shared error taxonomy

pub mod error;
pub mod kmer;
pub mod recall;
pub mod seqio;
