//! Candidate phrase generation shared by the ranking algorithms.

use crate::text::{Word, clean_text, sentences};

/// Texts with fewer content words than this are treated as degenerate.
pub(crate) const MIN_CONTENT_WORDS: usize = 3;

/// Longest candidate phrase in words.
pub(crate) const MAX_PHRASE_WORDS: usize = 3;

/// One occurrence of a candidate phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    /// Lowercased words of the phrase.
    pub words: Vec<String>,
    /// Index of the sentence the phrase occurs in.
    pub sentence: usize,
    /// Token position of the first word across the whole text.
    pub position: usize,
}

impl Candidate {
    pub fn phrase(&self) -> String {
        self.words.join(" ")
    }
}

/// Cleaned, tokenized text ready for ranking.
#[derive(Debug, Clone)]
pub(crate) struct PreparedText {
    pub sentences: Vec<Vec<Word>>,
}

impl PreparedText {
    /// Cleans and tokenizes `raw`; `None` when too little content remains to rank.
    pub fn new(raw: &str) -> Option<Self> {
        let sentences = sentences(&clean_text(raw));
        let content = sentences
            .iter()
            .flatten()
            .filter(|word| word.is_content())
            .count();
        if content < MIN_CONTENT_WORDS {
            return None;
        }
        Some(Self { sentences })
    }

    /// Maximal runs of content words, split into chunks of at most [`MAX_PHRASE_WORDS`].
    ///
    /// Stop words, non-content tokens and punctuation end a run.
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let mut position = 0usize;

        for (sentence_index, sentence) in self.sentences.iter().enumerate() {
            let mut run: Vec<(usize, &Word)> = Vec::new();
            for word in sentence {
                if word.break_before || !word.is_content() {
                    flush_run(&mut run, sentence_index, &mut candidates);
                }
                if word.is_content() {
                    run.push((position, word));
                }
                position += 1;
            }
            flush_run(&mut run, sentence_index, &mut candidates);
        }

        candidates
    }

    /// Content words per sentence, lowercased.
    pub fn content_words(&self) -> Vec<Vec<&str>> {
        self.sentences
            .iter()
            .map(|sentence| {
                sentence
                    .iter()
                    .filter(|word| word.is_content())
                    .map(|word| word.text.as_str())
                    .collect()
            })
            .collect()
    }
}

fn flush_run(run: &mut Vec<(usize, &Word)>, sentence: usize, out: &mut Vec<Candidate>) {
    for chunk in run.chunks(MAX_PHRASE_WORDS) {
        out.push(Candidate {
            words: chunk.iter().map(|(_, word)| word.text.clone()).collect(),
            sentence,
            position: chunk[0].0,
        });
    }
    run.clear();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_prepared_text_rejects_near_empty_input() {
        assert!(PreparedText::new("").is_none());
        assert!(PreparedText::new("the and of").is_none());
        assert!(PreparedText::new("gene flow").is_none());
        assert!(PreparedText::new("gene flow phylogeny").is_some());
    }

    #[test]
    fn test_candidates_split_at_stop_words_and_punctuation() {
        let prepared =
            PreparedText::new("Gene flow lizard adaptation of island lizards, phylogeny").unwrap();
        let phrases: Vec<String> = prepared.candidates().iter().map(Candidate::phrase).collect();
        assert_eq!(
            phrases,
            vec!["gene flow lizard", "adaptation", "island lizards", "phylogeny"]
        );
    }

    #[test]
    fn test_candidates_chunk_long_runs() {
        let prepared =
            PreparedText::new("mitochondrial genome assembly pipeline benchmark").unwrap();
        let phrases: Vec<String> = prepared.candidates().iter().map(Candidate::phrase).collect();
        assert_eq!(phrases, vec!["mitochondrial genome assembly", "pipeline benchmark"]);
    }

    #[test]
    fn test_candidates_record_positions_and_sentences() {
        let prepared = PreparedText::new("Gene flow matters. Island lizards adapt.").unwrap();
        let candidates = prepared.candidates();
        assert_eq!(candidates[0].position, 0);
        assert_eq!(candidates[0].sentence, 0);
        assert_eq!(candidates[1].sentence, 1);
        assert_eq!(candidates[1].position, 3);
    }
}
