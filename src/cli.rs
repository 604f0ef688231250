use crate::{
    constants::{DEFAULT_INCLUDE_FORMAT_TAG_PATTERN, DEFAULT_VARSCAN_HC_PATTERN},
    core::merge::{IncludeLoci, IncludeVariants},
};
use anyhow::anyhow;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| env!("CARGO_PKG_VERSION").to_string());

#[derive(Parser, Debug)]
#[command(name="jacquard",
          version=&**FULL_VERSION,
          about="Suite of tools to expedite analysis of exome variant data from multiple patients and variant callers",
          long_about = None,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true
    )]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create new VCFs, adding standardized Jacquard tags for each caller
    Translate(TranslateArgs),
    /// Combine Jacquard-tagged VCFs into a single multi-sample VCF
    Merge(MergeArgs),
    /// Add consensus summary tags to a merged Jacquard-tagged VCF
    Summarize(SummarizeArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Translate(_) => "translate",
            Command::Merge(_) => "merge",
            Command::Summarize(_) => "summarize",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(arg_required_else_help(true))]
pub struct TranslateArgs {
    /// Directory containing caller VCFs (and VarScan high-confidence files)
    #[arg(value_name = "INPUT_DIR", value_parser = check_dir_exists)]
    pub input_dir: PathBuf,

    /// Directory where translated VCFs are written
    #[arg(value_name = "OUTPUT_DIR", value_parser = check_prefix_path)]
    pub output_dir: PathBuf,

    /// Translate the recognized files, warning on the rest instead of failing
    #[arg(long = "force")]
    pub force: bool,

    /// Regex matched against file names to identify VarScan high-confidence files
    #[arg(
        long = "varscan-hc-filter-file-regex",
        value_name = "REGEX",
        default_value = DEFAULT_VARSCAN_HC_PATTERN,
        help_heading = "Advanced"
    )]
    pub varscan_hc_pattern: String,
}

#[derive(Parser, Debug, Clone)]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .args(["vcfs", "vcf_list"]),
))]
#[command(arg_required_else_help(true))]
pub struct MergeArgs {
    /// Translated VCF files to merge
    #[arg(
        long = "vcf",
        value_name = "VCF",
        num_args = 1..,
        value_parser = check_file_exists
    )]
    pub vcfs: Option<Vec<PathBuf>>,

    /// File containing paths of VCF files to merge (one per line)
    #[arg(
        long = "vcf-list",
        value_name = "VCF_LIST",
        value_parser = check_file_exists
    )]
    pub vcf_list: Option<PathBuf>,

    /// Write the merged VCF to this file
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        value_parser = check_prefix_path,
        required = true
    )]
    pub output: PathBuf,

    /// Which records enter the merge: all, passed, or somatic
    #[arg(
        long = "include-variants",
        value_name = "POLICY",
        default_value = "all",
        value_parser = parse_include_variants
    )]
    pub include_variants: IncludeVariants,

    /// Whole-locus policy: all, any_passed, all_passed, any_somatic, all_somatic
    #[arg(
        long = "include-loci",
        value_name = "POLICY",
        default_value = "all",
        value_parser = parse_include_loci
    )]
    pub include_loci: IncludeLoci,

    /// Regexes of FORMAT tags to retain in the merged output (comma-separated)
    #[arg(
        long = "include-format-tags",
        value_name = "REGEX",
        value_delimiter = ',',
        default_value = DEFAULT_INCLUDE_FORMAT_TAG_PATTERN
    )]
    pub include_format_tags: Vec<String>,

    /// Regex matched against file names to identify VarScan high-confidence files
    #[arg(
        long = "varscan-hc-filter-file-regex",
        value_name = "REGEX",
        default_value = DEFAULT_VARSCAN_HC_PATTERN,
        help_heading = "Advanced"
    )]
    pub varscan_hc_pattern: String,
}

#[derive(Parser, Debug, Clone)]
#[command(arg_required_else_help(true))]
pub struct SummarizeArgs {
    /// Merged Jacquard-tagged VCF
    #[arg(value_name = "INPUT", value_parser = check_file_exists)]
    pub input: PathBuf,

    /// Write the summarized VCF to this file
    #[arg(value_name = "OUTPUT", value_parser = check_prefix_path)]
    pub output: PathBuf,
}

/// Initializes the verbosity level for logging based on the command-line arguments.
///
/// Sets up the logger with a specific verbosity level that is determined
/// by the number of occurrences of the `-v` or `--verbose` flag in the command-line arguments.
pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.module_path().unwrap_or("unknown_module"),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_file_exists(s: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(s);
    if !path.is_file() {
        return Err(anyhow!("File does not exist: {}", path.display()));
    }
    Ok(path.to_path_buf())
}

fn check_dir_exists(s: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(s);
    if !path.is_dir() {
        return Err(anyhow!("Directory does not exist: {}", path.display()));
    }
    Ok(path.to_path_buf())
}

fn check_prefix_path(s: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(anyhow!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(path.to_path_buf())
}

fn parse_include_variants(s: &str) -> anyhow::Result<IncludeVariants> {
    s.parse().map_err(|error| anyhow!("{error}"))
}

fn parse_include_loci(s: &str) -> anyhow::Result<IncludeLoci> {
    s.parse().map_err(|error| anyhow!("{error}"))
}

impl MergeArgs {
    pub fn process_vcf_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        match (&self.vcfs, &self.vcf_list) {
            (Some(vcfs), None) => Ok(vcfs.clone()),
            (None, Some(list_path)) => Self::read_vcf_paths_from_file(list_path),
            _ => unreachable!("Either --vcf or --vcf-list is provided, never both"),
        }
    }

    fn read_vcf_paths_from_file(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let file = File::open(path)
            .map_err(|e| anyhow!("Failed to open VCF list file {}: {}", path.display(), e))?;
        let reader = BufReader::new(file);

        let mut paths = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| anyhow!("Error reading line {}: {}", line_num + 1, e))?;
            let trimmed = line.trim();
            // Skip empty or comment lines
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let path = PathBuf::from(trimmed);
            if !path.exists() {
                Err(anyhow!("VCF file does not exist: {}", path.display()))?;
            }
            paths.push(path);
        }

        if paths.is_empty() {
            Err(anyhow!("No VCF paths found in the input file".to_string()))?;
        }

        Ok(paths)
    }
}
