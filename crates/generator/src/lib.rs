//! End-to-end generation pipeline: map a scale request to a pre-trained
//! (corpus, weights) pair, load both, pick a random seed window from the
//! encoded corpus, run the autoregressive loop and render the predicted
//! tokens to MIDI bytes.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use rand::Rng;
use thiserror::Error;

use lstm_infer::{Network, WeightsContainer, WeightsError};
use notes_core::{Score, ScoreError, Vocabulary};

/// Length of the encoded window fed to the network. Fixed by training.
pub const SEQUENCE_LENGTH: usize = 100;
/// Number of tokens produced per generation run.
pub const GENERATED_LENGTH: usize = 20;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed reading corpus {path}: {source}")]
    CorpusRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corpus {path} is not a JSON token list: {source}")]
    CorpusFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("corpus has {len} tokens, need at least {min}")]
    CorpusTooShort { len: usize, min: usize },
    #[error("failed reading weights {path}: {source}")]
    WeightsRead {
        path: PathBuf,
        #[source]
        source: WeightsError,
    },
    #[error(transparent)]
    Weights(#[from] WeightsError),
    #[error("network predicts {classes} classes but the vocabulary has {vocab} tokens")]
    VocabularyMismatch { classes: usize, vocab: usize },
    #[error(transparent)]
    Score(#[from] ScoreError),
}

/// Which pre-trained (corpus, weights) pair a request maps to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AssetKind {
    AllChords,
    #[default]
    CMajor,
}

impl AssetKind {
    /// `"Random"` is the only recognized sentinel; every other scale value
    /// falls through to the C-major pair.
    pub fn from_scale(scale: &str) -> Self {
        if scale == "Random" {
            AssetKind::AllChords
        } else {
            AssetKind::CMajor
        }
    }

    pub fn corpus_file(self) -> &'static str {
        match self {
            AssetKind::AllChords => "midi_chords.json",
            AssetKind::CMajor => "midi_chords_cmaj.json",
        }
    }

    pub fn weights_file(self) -> &'static str {
        match self {
            AssetKind::AllChords => "all_chords_16may.lyrw",
            AssetKind::CMajor => "midi_chords_weight_cmaj.lyrw",
        }
    }

    pub fn paths(self, data_dir: &Path) -> (PathBuf, PathBuf) {
        (
            data_dir.join(self.corpus_file()),
            data_dir.join(self.weights_file()),
        )
    }
}

/// Everything one generation run needs, loaded up front.
#[derive(Debug)]
pub struct Assets {
    pub notes: Vec<String>,
    pub vocab: Vocabulary,
    pub network: Network,
}

impl Assets {
    pub fn load(kind: AssetKind, data_dir: &Path) -> Result<Self, GenerateError> {
        let (corpus_path, weights_path) = kind.paths(data_dir);
        tracing::info!(
            corpus = %corpus_path.display(),
            weights = %weights_path.display(),
            "loading assets"
        );

        let file = File::open(&corpus_path).map_err(|source| GenerateError::CorpusRead {
            path: corpus_path.clone(),
            source,
        })?;
        let notes: Vec<String> = serde_json::from_reader(BufReader::new(file)).map_err(
            |source| GenerateError::CorpusFormat {
                path: corpus_path,
                source,
            },
        )?;

        let container =
            WeightsContainer::load(&weights_path).map_err(|source| GenerateError::WeightsRead {
                path: weights_path,
                source,
            })?;
        let network = Network::from_container(&container)?;

        Self::from_parts(notes, network)
    }

    /// Build from already-loaded pieces, validating corpus length and that
    /// the network's class count matches the corpus vocabulary.
    pub fn from_parts(notes: Vec<String>, network: Network) -> Result<Self, GenerateError> {
        if notes.len() < SEQUENCE_LENGTH + 1 {
            return Err(GenerateError::CorpusTooShort {
                len: notes.len(),
                min: SEQUENCE_LENGTH + 1,
            });
        }
        let vocab = Vocabulary::from_corpus(notes.iter().map(String::as_str));
        if network.output_classes() != vocab.len() {
            return Err(GenerateError::VocabularyMismatch {
                classes: network.output_classes(),
                vocab: vocab.len(),
            });
        }
        Ok(Self {
            notes,
            vocab,
            network,
        })
    }
}

/// Run the autoregressive loop: seed with a random corpus window, then
/// repeatedly predict, decode and slide. Deterministic for a fixed `rng`.
pub fn generate_tokens<R: Rng>(
    assets: &Assets,
    rng: &mut R,
) -> Result<Vec<String>, GenerateError> {
    let encoded: Vec<usize> = assets
        .notes
        .iter()
        .map(|token| {
            assets
                .vocab
                .encode(token)
                .expect("corpus token is in its own vocabulary")
        })
        .collect();

    let start = rng.gen_range(0..encoded.len() - SEQUENCE_LENGTH);
    tracing::debug!(start, "seed window chosen");
    let mut window: Vec<usize> = encoded[start..start + SEQUENCE_LENGTH].to_vec();

    let n_vocab = assets.vocab.len() as f32;
    let mut output = Vec::with_capacity(GENERATED_LENGTH);
    for _ in 0..GENERATED_LENGTH {
        let input =
            Array2::from_shape_fn((SEQUENCE_LENGTH, 1), |(t, _)| window[t] as f32 / n_vocab);
        let class = assets.network.predict_class(&input)?;
        let token = assets
            .vocab
            .decode(class)
            .expect("class count was checked against the vocabulary");
        output.push(token.to_owned());
        window.remove(0);
        window.push(class);
    }
    Ok(output)
}

/// Full pipeline: predicted tokens → timed score → MIDI bytes.
pub fn generate_midi<R: Rng>(assets: &Assets, rng: &mut R) -> Result<Vec<u8>, GenerateError> {
    let tokens = generate_tokens(assets, rng)?;
    tracing::info!(?tokens, "generated sequence");
    let score = Score::from_tokens(&tokens)?;
    Ok(score.to_midi_bytes()?)
}
