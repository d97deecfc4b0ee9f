// Clippy allows
#![allow(clippy::too_many_arguments)]

//! genocode: dense byte encodings of genome-wide annotations
//!
//! Usage: genocode <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::process;

use genocode::commands::{
    collapse_cadd, extract_chromosome, split_wiggle, wig_to_tsv, AnnotateCommand, GenomeSource,
    ScoreCommand, TabularCommand,
};
use genocode::genome::ChromosomeIndex;
use genocode::io::{create_writer, open_reader_or_stdin, source_label};
use genocode::streaming::buffers::DEFAULT_MAX_GENOME_SIZE;
use genocode::{EncodeError, OffsetFormat, OverlayMode, QuantParams, WeightReusePolicy};

#[derive(Parser)]
#[command(name = "genocode")]
#[command(version)]
#[command(about = "Encode genome-wide scores and annotations as one byte per base", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quantize fixedStep/variableStep wiggle scores into a genome buffer
    Score {
        /// Genome size in bases
        #[arg(short = 'g', long)]
        genome_size: usize,

        /// Chromosome offset file
        #[arg(short = 'c', long)]
        offsets: PathBuf,

        /// Wiggle inputs, encoded in order (use - for stdin)
        #[arg(short = 'w', long = "wig", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Lowest possible score
        #[arg(long, allow_hyphen_values = true)]
        min: f64,

        /// Highest possible score
        #[arg(long, allow_hyphen_values = true)]
        max: f64,

        /// Number of score codes (5-255)
        #[arg(short = 'r', long = "resolution")]
        levels: u16,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Header lines before the first offset record
        #[arg(long, default_value = "1")]
        offset_header_lines: usize,
    },

    /// Quantize tabular `chrom pos score...` records into one buffer per score column
    Tabular {
        /// Genome size in bases
        #[arg(short = 'g', long)]
        genome_size: usize,

        /// Chromosome offset file
        #[arg(short = 'c', long)]
        offsets: PathBuf,

        /// Tabular input (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Lowest possible score
        #[arg(long, allow_hyphen_values = true)]
        min: f64,

        /// Highest possible score
        #[arg(long, allow_hyphen_values = true)]
        max: f64,

        /// Number of score codes (5-255)
        #[arg(short = 'r', long = "resolution")]
        levels: u16,

        /// Output base name; channel k is written to <OUTPUT>.k
        #[arg(short, long)]
        output: PathBuf,

        /// Scores per record
        #[arg(long, default_value = "3")]
        channels: usize,

        /// 0-based column of the first score
        #[arg(long, default_value = "2")]
        score_column: usize,

        /// Header lines before the first offset record
        #[arg(long, default_value = "1")]
        offset_header_lines: usize,
    },

    /// Overlay weighted interval annotations onto a genome buffer
    Annotate {
        /// Genome size in bases (zero-filled buffer)
        #[arg(short = 'g', long, required_unless_present = "reference", conflicts_with = "reference")]
        genome_size: Option<usize>,

        /// Reference genome string to encode as base codes before the overlay
        #[arg(long)]
        reference: Option<PathBuf>,

        /// File listing one annotation file per line
        #[arg(short = 'l', long)]
        list: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// How weights combine with existing bytes
        #[arg(long, value_enum, default_value = "bitwise")]
        mode: ModeArg,

        /// What to do when two annotation files share a weight
        #[arg(long, value_enum, default_value = "allow")]
        weight_reuse: ReuseArg,

        /// Largest reference genome accepted, in bases
        #[arg(long, default_value_t = DEFAULT_MAX_GENOME_SIZE)]
        max_genome_size: usize,
    },

    /// Rewrite a wiggle file as tab-separated chrom/position/value lines
    WigToTsv {
        /// Wiggle input (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split a multi-chromosome wiggle file into <DIR>/<chrom>.wig files
    SplitWig {
        /// Wiggle input (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short = 'd', long)]
        dir: PathBuf,

        /// Only keep chromosomes listed in this offset file
        #[arg(short = 'c', long)]
        offsets: Option<PathBuf>,

        /// Header lines before the first offset record
        #[arg(long, default_value = "1")]
        offset_header_lines: usize,
    },

    /// Fold per-allele CADD rows into one row per position
    CollapseCadd {
        /// CADD table (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy one chromosome out of a multi-FASTA file
    ExtractFasta {
        /// Multi-FASTA input (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Chromosome name as it appears after '>'
        #[arg(short = 'n', long)]
        chrom: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write only the sequence, without header or line breaks
        #[arg(long)]
        sequence_only: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Bitwise,
    Additive,
}

impl From<ModeArg> for OverlayMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Bitwise => OverlayMode::Bitwise,
            ModeArg::Additive => OverlayMode::Additive,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ReuseArg {
    Allow,
    Warn,
    Error,
}

impl From<ReuseArg> for WeightReusePolicy {
    fn from(arg: ReuseArg) -> Self {
        match arg {
            ReuseArg::Allow => WeightReusePolicy::Allow,
            ReuseArg::Warn => WeightReusePolicy::Warn,
            ReuseArg::Error => WeightReusePolicy::Error,
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Score {
            genome_size,
            offsets,
            inputs,
            min,
            max,
            levels,
            output,
            offset_header_lines,
        } => run_score(
            genome_size,
            offsets,
            inputs,
            min,
            max,
            levels,
            output,
            offset_header_lines,
        ),

        Commands::Tabular {
            genome_size,
            offsets,
            input,
            min,
            max,
            levels,
            output,
            channels,
            score_column,
            offset_header_lines,
        } => run_tabular(
            genome_size,
            offsets,
            input,
            min,
            max,
            levels,
            output,
            channels,
            score_column,
            offset_header_lines,
        ),

        Commands::Annotate {
            genome_size,
            reference,
            list,
            output,
            mode,
            weight_reuse,
            max_genome_size,
        } => run_annotate(
            genome_size,
            reference,
            list,
            output,
            mode,
            weight_reuse,
            max_genome_size,
        ),

        Commands::WigToTsv { input, output } => run_wig_to_tsv(&input, output.as_deref()),

        Commands::SplitWig {
            input,
            dir,
            offsets,
            offset_header_lines,
        } => run_split_wig(&input, &dir, offsets.as_deref(), offset_header_lines),

        Commands::CollapseCadd { input, output } => {
            run_collapse_cadd(input.as_deref(), output.as_deref())
        }

        Commands::ExtractFasta {
            input,
            chrom,
            output,
            sequence_only,
        } => run_extract_fasta(&input, &chrom, output.as_deref(), sequence_only),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run_score(
    genome_size: usize,
    offsets: PathBuf,
    inputs: Vec<PathBuf>,
    min: f64,
    max: f64,
    levels: u16,
    output: PathBuf,
    offset_header_lines: usize,
) -> Result<(), EncodeError> {
    let params = QuantParams::new(min, max, levels)?;
    ScoreCommand::new(params)
        .with_offset_format(OffsetFormat::with_header_lines(offset_header_lines))
        .run(genome_size, offsets, &inputs, output)?;
    Ok(())
}

fn run_tabular(
    genome_size: usize,
    offsets: PathBuf,
    input: PathBuf,
    min: f64,
    max: f64,
    levels: u16,
    output: PathBuf,
    channels: usize,
    score_column: usize,
    offset_header_lines: usize,
) -> Result<(), EncodeError> {
    let params = QuantParams::new(min, max, levels)?;
    TabularCommand::new(params)
        .with_offset_format(OffsetFormat::with_header_lines(offset_header_lines))
        .with_channels(channels)
        .with_score_column(score_column)
        .run(genome_size, offsets, input, output)?;
    Ok(())
}

fn run_annotate(
    genome_size: Option<usize>,
    reference: Option<PathBuf>,
    list: PathBuf,
    output: PathBuf,
    mode: ModeArg,
    weight_reuse: ReuseArg,
    max_genome_size: usize,
) -> Result<(), EncodeError> {
    let source = match (reference, genome_size) {
        (Some(path), _) => GenomeSource::Reference {
            path,
            limit: max_genome_size,
        },
        (None, Some(size)) => GenomeSource::Size(size),
        (None, None) => {
            return Err(EncodeError::Config(
                "either --genome-size or --reference is required".to_string(),
            ))
        }
    };
    AnnotateCommand::new()
        .with_mode(mode.into())
        .with_reuse(weight_reuse.into())
        .run(&source, list, output)?;
    Ok(())
}

fn run_wig_to_tsv(input: &Path, output: Option<&Path>) -> Result<(), EncodeError> {
    let reader = open_reader_or_stdin(input)?;
    wig_to_tsv(reader, &source_label(input), create_writer(output)?)?;
    Ok(())
}

fn run_split_wig(
    input: &Path,
    dir: &Path,
    offsets: Option<&Path>,
    offset_header_lines: usize,
) -> Result<(), EncodeError> {
    let index = offsets
        .map(|p| ChromosomeIndex::from_file(p, OffsetFormat::with_header_lines(offset_header_lines)))
        .transpose()?;
    std::fs::create_dir_all(dir).map_err(|source| EncodeError::Open {
        path: dir.to_path_buf(),
        source,
    })?;
    let reader = open_reader_or_stdin(input)?;
    split_wiggle(reader, &source_label(input), dir, index.as_ref())?;
    Ok(())
}

fn run_collapse_cadd(input: Option<&Path>, output: Option<&Path>) -> Result<(), EncodeError> {
    let input = input.unwrap_or(Path::new("-"));
    let reader = open_reader_or_stdin(input)?;
    collapse_cadd(reader, &source_label(input), create_writer(output)?)?;
    Ok(())
}

fn run_extract_fasta(
    input: &Path,
    chrom: &str,
    output: Option<&Path>,
    sequence_only: bool,
) -> Result<(), EncodeError> {
    let reader = open_reader_or_stdin(input)?;
    extract_chromosome(
        reader,
        &source_label(input),
        chrom,
        create_writer(output)?,
        sequence_only,
    )?;
    Ok(())
}
