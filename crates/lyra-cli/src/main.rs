use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::PathBuf;

use generator::{AssetKind, Assets};
use lstm_infer::{TensorDump, WeightsContainer};

/// Offline tooling for the lyra music generator: run the generation pipeline
/// without the server, and convert or inspect weight containers.
#[derive(Parser, Debug)]
#[command(name = "lyra", version, about = "Neural note-sequence generation")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a MIDI file from a pre-trained model
    Generate {
        /// Directory holding the corpus and weight files
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Scale selector; "Random" picks the all-chords model
        #[arg(long, default_value = "C")]
        scale: String,

        #[arg(long, default_value = "generatedMIDI.mid")]
        out: PathBuf,

        /// Fix the RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Convert a JSON tensor dump into a weight container
    Convert {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// List the tensors in a weight container
    Inspect {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Generate {
            data_dir,
            scale,
            out,
            seed,
        } => {
            let kind = AssetKind::from_scale(&scale);
            let assets = Assets::load(kind, &data_dir)?;
            let bytes = match seed {
                Some(seed) => generator::generate_midi(&assets, &mut StdRng::seed_from_u64(seed))?,
                None => generator::generate_midi(&assets, &mut rand::thread_rng())?,
            };
            fs::write(&out, &bytes)
                .with_context(|| format!("failed writing {}", out.display()))?;
            eprintln!("✓ wrote {}", out.display());
        }

        Commands::Convert { input, output } => {
            let json = fs::read_to_string(&input)
                .with_context(|| format!("failed reading {}", input.display()))?;
            let dump: TensorDump =
                serde_json::from_str(&json).context("input is not a valid tensor dump")?;
            let mut container = WeightsContainer::new();
            for tensor in dump.tensors {
                container.insert(tensor)?;
            }
            container.save(&output)?;
            eprintln!("✓ wrote {} ({} tensors)", output.display(), container.len());
        }

        Commands::Inspect { input } => {
            let container = WeightsContainer::load(&input)?;
            for tensor in container.iter() {
                println!("{}  {:?}  ({} values)", tensor.name, tensor.shape, tensor.data.len());
            }
        }
    }

    Ok(())
}
