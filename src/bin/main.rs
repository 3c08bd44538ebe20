//! Command-line tool for inlining, consolidating and converting reference files.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use zarrs::filesystem::FilesystemStore;

use h5refs::{
    Alignment, ConsolidateOptions, Consolidator, Error, OutputFormat, ReferenceFile,
    inline_references, write_references,
};

#[derive(Parser)]
#[command(name = "h5refs")]
#[command(about = "Build and combine byte-range reference files for HDF5 data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inline small chunks of a reference file
    Inline(InlineArgs),
    /// Merge the reference files of several sources
    Consolidate(ConsolidateArgs),
    /// Re-encode a reference file
    Convert(ConvertArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: json or columnar (default: from the output extension)
    #[arg(long)]
    format: Option<String>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct InlineArgs {
    /// Reference file to update
    input: PathBuf,

    /// Inline references shorter than this many bytes
    #[arg(long, default_value_t = 100)]
    threshold: u64,

    /// Directory that local source paths are resolved against
    #[arg(long, default_value = "/")]
    root: PathBuf,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct ConsolidateArgs {
    /// Reference files, one per source, in alignment order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON description of the aligned dataset
    #[arg(long)]
    alignment: PathBuf,

    /// Source identifiers used more often than this become templates
    #[arg(long, default_value_t = 5)]
    template_count: usize,

    /// Inline references shorter than this many bytes
    #[arg(long, default_value_t = 100)]
    inline_threshold: u64,

    /// Directory that local source paths are resolved against
    #[arg(long, default_value = "/")]
    root: PathBuf,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct ConvertArgs {
    /// Reference file to convert
    input: PathBuf,

    #[command(flatten)]
    output: OutputArgs,
}

impl OutputArgs {
    /// Decide the format before anything is read or written.
    fn format(&self) -> Result<OutputFormat, Error> {
        match (&self.format, &self.output) {
            (Some(f), _) => f.parse(),
            (None, Some(path)) => OutputFormat::from_path(path),
            (None, None) => Ok(OutputFormat::Json),
        }
    }

    fn write(&self, file: &ReferenceFile, format: OutputFormat) -> Result<(), Error> {
        match &self.output {
            Some(path) => {
                let mut w = BufWriter::new(fs::File::create(path)?);
                write_references(file, format, self.pretty, &mut w)?;
                w.flush()?;
                log::info!("wrote {} references to {}", file.refs.len(), path.display());
            }
            None => {
                let mut w = io::stdout().lock();
                write_references(file, format, self.pretty, &mut w)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<ReferenceFile, Error> {
    ReferenceFile::from_json(&fs::read_to_string(path)?)
}

fn reader(root: &Path) -> Result<FilesystemStore, Error> {
    FilesystemStore::new(root).map_err(Error::wrap)
}

fn run_inline(args: InlineArgs) -> Result<(), Error> {
    let format = args.output.format()?;
    let file = read_file(&args.input)?;
    let mut refs = file.resolve();
    let count = inline_references(&mut refs, args.threshold, &reader(&args.root)?)?;
    eprintln!("Inlined {count} references");
    args.output.write(&ReferenceFile::new(refs), format)
}

fn run_consolidate(args: ConsolidateArgs) -> Result<(), Error> {
    let format = args.output.format()?;
    let alignment: Alignment = serde_json::from_str(&fs::read_to_string(&args.alignment)?)?;
    let stores = args
        .inputs
        .iter()
        .map(|p| read_file(p).map(|f| f.resolve()))
        .collect::<Result<Vec<_>, _>>()?;

    let partition = alignment.partition()?;
    let consolidator = Consolidator::new(ConsolidateOptions {
        template_count: args.template_count,
        inline_threshold: args.inline_threshold,
    });
    let (file, stats) =
        consolidator.consolidate(&alignment, &stores, &partition, &reader(&args.root)?)?;
    eprintln!(
        "Consolidated {} sources into {} references ({} templates, {} inlined)",
        stats.sources,
        file.refs.len(),
        stats.templates,
        stats.inlined
    );
    args.output.write(&file, format)
}

fn run_convert(args: ConvertArgs) -> Result<(), Error> {
    let format = args.output.format()?;
    let file = read_file(&args.input)?;
    args.output.write(&file, format)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inline(args) => run_inline(args),
        Commands::Consolidate(args) => run_consolidate(args),
        Commands::Convert(args) => run_convert(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
