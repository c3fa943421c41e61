use std::collections::{BTreeSet, HashMap};

/// Distinct corpus tokens with a stable integer encoding.
///
/// Tokens are ordered lexicographically, so the same corpus always yields the
/// same token↔integer mapping; loaded weights depend on that stability.
#[derive(Clone, Debug, Default)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn from_corpus<'a, I>(corpus: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = corpus.into_iter().collect();
        let tokens: Vec<String> = distinct.into_iter().map(str::to_owned).collect();
        let index = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self { tokens, index }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn encode(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn decode(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicographic_ordering() {
        let vocab = Vocabulary::from_corpus(["G4", "C4", "4.8.11", "C4"]);
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.decode(0), Some("4.8.11"));
        assert_eq!(vocab.decode(1), Some("C4"));
        assert_eq!(vocab.decode(2), Some("G4"));
    }

    #[test]
    fn encode_decode_is_a_bijection() {
        let corpus = ["B-3", "C4", "E4", "G4", "4.8.11", "2.5.9", "C4", "E4"];
        let vocab = Vocabulary::from_corpus(corpus);
        for token in corpus {
            let id = vocab.encode(token).unwrap();
            assert_eq!(vocab.decode(id), Some(token));
        }
        for id in 0..vocab.len() {
            let token = vocab.decode(id).unwrap();
            assert_eq!(vocab.encode(token), Some(id));
        }
    }

    #[test]
    fn unknown_token_has_no_encoding() {
        let vocab = Vocabulary::from_corpus(["C4"]);
        assert_eq!(vocab.encode("D4"), None);
        assert_eq!(vocab.decode(1), None);
    }
}
