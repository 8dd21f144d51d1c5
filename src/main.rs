#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod assemble;
mod confirm;
mod error;
mod merge;
mod options;
mod parse;
mod sizing;
mod units;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use assemble::Progress;
use options::{ImageSizeSpec, Orientation, PageSizeSpec, PartialConversionOptions};

#[derive(Parser)]
#[command(name = "stackpdf", version, about = "Stack images into a single multi-page PDF")]
struct Cli {
    /// suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// combine images into a PDF, one page per image
    Merge {
        /// image files, dirs or glob patterns (default "*.jpg")
        inputs: Vec<String>,

        /// output PDF path, "-" for stdout (default "000_outputFile.pdf")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// PDF author metadata
        #[arg(long)]
        author: Option<String>,

        /// image, a4, a3, a2, a1, a0, letter, legal or WIDTHxHEIGHT in mm
        #[arg(long)]
        page_size: Option<PageSizeSpec>,

        /// image, page, page-width, page-height or WIDTHxHEIGHT in mm
        #[arg(long)]
        image_size: Option<ImageSizeSpec>,

        /// orientation of the named page sizes
        #[arg(long)]
        orientation: Option<Orientation>,

        /// skip the file order confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// generate shell completions
    Completions {
        /// shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// progress lines on stderr
struct StderrProgress {
    quiet: bool,
    start: Instant,
}

impl Progress for StderrProgress {
    fn page_added(&mut self, index: usize, total: usize, path: &Path) {
        if !self.quiet {
            eprintln!("  [{}/{}] {}", index, total, path.display());
        }
    }

    fn writing(&mut self, output: &Path) {
        if !self.quiet {
            eprintln!("Creating output file \"{}\"", output.display());
        }
    }

    fn finished(&mut self, _output: &Path) {
        if !self.quiet {
            eprintln!(
                "Done. PDF saved in {:.2}s",
                self.start.elapsed().as_secs_f64()
            );
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stackpdf=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Merge {
            inputs,
            output,
            author,
            page_size,
            image_size,
            orientation,
            yes,
        } => {
            let inputs = if inputs.is_empty() {
                vec![parse::DEFAULT_PATTERN.to_string()]
            } else {
                inputs
            };
            let images = parse::expand_image_paths(&inputs)?;

            if !yes {
                let stdin = std::io::stdin();
                let confirmed =
                    confirm::confirm_files(&images, stdin.lock(), std::io::stderr())?;
                if !confirmed {
                    eprintln!("Please re-run with the correct file order");
                    return Ok(());
                }
            }

            let options = PartialConversionOptions {
                author,
                output,
                page_size,
                image_size,
                orientation,
            };
            let mut sink = merge::PdfSink::new();
            let mut progress = StderrProgress {
                quiet,
                start: Instant::now(),
            };
            if !quiet {
                eprintln!("Merging {} image(s)", images.len());
            }
            assemble::assemble(&images, options, &mut sink, &mut progress)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "stackpdf",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
