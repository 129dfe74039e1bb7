mod error;
mod kmer;
mod recall;
mod seqio;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kmer::KmerFilter;
use recall::RecallEvaluator;

fn parse_kmer_len(s: &str) -> Result<usize, String> {
    let val: usize = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if val == 0 {
        Err("K-mer length must be at least 1".to_string())
    } else {
        Ok(val)
    }
}

#[derive(Parser)]
#[command(name = "taxkit")]
#[command(version)]
#[command(about = "Sequence classification evaluation and k-mer pre-filtering")]
#[command(long_about = r#"
taxkit - utilities for evaluating and preparing sequence classification data

SUBCOMMANDS:
  recall        Compare a ground-truth species table against classifier
                predictions: joins on the assembly accession, reports correct
                calls and an error breakdown (no calls, genus-only calls,
                wrong-species calls), and writes the joined rows plus a
                differences file.

  filter-kmers  Scan a sequence file (.fa = FASTA, .gz = gzipped FASTQ,
                anything else = FASTQ), count k-mers starting with a prefix
                over both orientations, and write the ones seen at least
                --min-freq times as a FASTA-like file.

EXAMPLES:
  taxkit recall -g metadata.csv -p results.csv -o comparison.csv
  taxkit filter-kmers -i reads.fastq.gz -o kmers.fa --prefix ATGAC -k 11
"#)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate species recall of classifier predictions
    Recall {
        #[arg(short = 'g', long, value_name = "FILE", help_heading = "Input")]
        ground_truth: PathBuf,

        #[arg(short = 'p', long, value_name = "FILE", help_heading = "Input")]
        predictions: PathBuf,

        #[arg(short = 'o', long, value_name = "FILE", help_heading = "Output")]
        output: PathBuf,

        #[arg(short = 'v', long, help_heading = "Output")]
        verbose: bool,
    },
    /// Keep frequent prefixed k-mers from a sequence file
    FilterKmers {
        #[arg(short = 'i', long, value_name = "FILE", help_heading = "Input")]
        input: PathBuf,

        #[arg(short = 'o', long, value_name = "FILE", help_heading = "Output")]
        output: PathBuf,

        #[arg(long, value_name = "SEQ", default_value = "ATGAC", help_heading = "Filtering")]
        prefix: String,

        #[arg(short = 'k', long = "kmer", value_name = "LEN", default_value = "11",
              value_parser = parse_kmer_len, help_heading = "Filtering")]
        kmer: usize,

        #[arg(short = 'm', long = "min-freq", value_name = "NUM", default_value = "2",
              help_heading = "Filtering")]
        min_freq: u64,

        #[arg(short = 'v', long, help_heading = "Output")]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Recall {
            ground_truth,
            predictions,
            output,
            verbose,
        } => {
            let evaluator = RecallEvaluator { verbose };
            let report = evaluator.compare(&ground_truth, &predictions, &output)?;
            report.print_summary();
        }
        Command::FilterKmers {
            input,
            output,
            prefix,
            kmer,
            min_freq,
            verbose,
        } => {
            let filter = KmerFilter {
                prefix,
                k: kmer,
                min_freq,
                verbose,
            };
            filter.run(&input, &output)?;
        }
    }

    Ok(())
}
