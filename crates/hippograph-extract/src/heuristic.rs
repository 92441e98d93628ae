//! Heuristic open information extraction.
//!
//! Entities are capitalized word runs, quoted terms and four-digit years.
//! Triples link consecutive entity mentions inside one sentence, using the
//! words between them as the predicate.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use hippograph_core::Result;

use crate::processor::OpenIe;
use crate::types::{NerOutput, TripleOutput};

/// Capitalized words that only start sentences, never names.
static LEADING_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "A", "An", "The", "In", "On", "At", "By", "For", "From", "Of", "To", "With", "And",
        "But", "Or", "If", "When", "While", "After", "Before", "Since", "During", "This",
        "That", "These", "Those", "It", "Its", "He", "She", "They", "We", "I", "You", "His",
        "Her", "Their", "Our", "There", "Here", "As", "Then", "So", "Yet", "However", "Also",
    ]
    .into_iter()
    .collect()
});

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").unwrap());
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]{2,40})""#).unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(1[5-9]|20)\d{2}$").unwrap());

/// Maximum words allowed in a predicate between two mentions.
const MAX_PREDICATE_WORDS: usize = 6;

/// Split text into sentences without lookbehind.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'.' || b == b'!' || b == b'?' || b == b'\n')
            && (i + 1 == bytes.len() || bytes[i + 1].is_ascii_whitespace())
        {
            let s = text[start..=i].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = i + 1;
        }
    }
    if start < text.len() {
        let s = text[start..].trim();
        if !s.is_empty() {
            sentences.push(s);
        }
    }
    sentences
}

/// A word with surrounding punctuation stripped.
struct Word<'a> {
    clean: &'a str,
    /// Punctuation directly after the word (`,`, `;`, `:`) closes a run.
    breaks_after: bool,
}

fn words(sentence: &str) -> Vec<Word<'_>> {
    WORD_RE
        .find_iter(sentence)
        .map(|m| {
            let raw = m.as_str();
            let clean = raw.trim_matches(|c: char| !c.is_alphanumeric());
            let breaks_after = raw
                .trim_end_matches(|c: char| c == '"' || c == '\'' || c == ')')
                .ends_with(|c: char| matches!(c, ',' | ';' | ':' | '.' | '!' | '?'));
            Word {
                clean,
                breaks_after,
            }
        })
        .collect()
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_uppercase())
}

/// An entity mention: word span `[start, end)` and its surface text.
#[derive(Debug, Clone, PartialEq)]
struct Mention {
    start: usize,
    end: usize,
    text: String,
}

/// Find entity mentions in one sentence, in order.
fn sentence_mentions(sentence: &str) -> Vec<Mention> {
    let words = words(sentence);
    let mut mentions = Vec::new();
    let mut i = 0;

    while i < words.len() {
        let w = &words[i];
        if w.clean.is_empty() {
            i += 1;
            continue;
        }

        if YEAR_RE.is_match(w.clean) {
            mentions.push(Mention {
                start: i,
                end: i + 1,
                text: w.clean.to_string(),
            });
            i += 1;
            continue;
        }

        if !is_capitalized(w.clean) {
            i += 1;
            continue;
        }

        let mut end = i + 1;
        if !w.breaks_after {
            while end < words.len()
                && !words[end].clean.is_empty()
                && is_capitalized(words[end].clean)
            {
                end += 1;
                if words[end - 1].breaks_after {
                    break;
                }
            }
        }

        let mut start = i;
        while start < end && LEADING_STOPWORDS.contains(words[start].clean) {
            start += 1;
        }
        if start < end {
            let text = words[start..end]
                .iter()
                .map(|w| w.clean)
                .collect::<Vec<_>>()
                .join(" ");
            mentions.push(Mention { start, end, text });
        }
        i = end;
    }

    mentions
}

/// Rule-based `OpenIe` implementation.
#[derive(Debug, Clone, Default)]
pub struct HeuristicOpenIe;

impl HeuristicOpenIe {
    pub fn new() -> Self {
        Self
    }
}

impl OpenIe for HeuristicOpenIe {
    fn model_name(&self) -> &str {
        "heuristic"
    }

    fn ner(&self, chunk_id: &str, text: &str) -> Result<NerOutput> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for sentence in split_sentences(text) {
            for m in sentence_mentions(sentence) {
                if seen.insert(m.text.to_lowercase()) {
                    entities.push(m.text);
                }
            }
        }
        for cap in QUOTED_RE.captures_iter(text) {
            if let Some(m) = cap.get(1) {
                let term = m.as_str().trim().to_string();
                if !term.is_empty() && seen.insert(term.to_lowercase()) {
                    entities.push(term);
                }
            }
        }

        Ok(NerOutput {
            chunk_id: chunk_id.to_string(),
            unique_entities: entities,
        })
    }

    fn triple_extraction(
        &self,
        chunk_id: &str,
        text: &str,
        entities: &[String],
    ) -> Result<TripleOutput> {
        let allowed: HashSet<String> = entities.iter().map(|e| e.to_lowercase()).collect();
        let mut triples = Vec::new();

        for sentence in split_sentences(text) {
            let sentence_words = words(sentence);
            let mentions: Vec<Mention> = sentence_mentions(sentence)
                .into_iter()
                .filter(|m| allowed.contains(&m.text.to_lowercase()))
                .collect();

            for pair in mentions.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                let predicate: Vec<String> = sentence_words[a.end..b.start]
                    .iter()
                    .filter(|w| !w.clean.is_empty())
                    .map(|w| w.clean.to_lowercase())
                    .collect();
                if predicate.is_empty() || predicate.len() > MAX_PREDICATE_WORDS {
                    continue;
                }
                triples.push(vec![a.text.clone(), predicate.join(" "), b.text.clone()]);
            }
        }

        Ok(TripleOutput {
            chunk_id: chunk_id.to_string(),
            triples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("Acme Corp grew. It hired staff! Done");
        assert_eq!(s, vec!["Acme Corp grew.", "It hired staff!", "Done"]);
    }

    #[test]
    fn test_ner_finds_runs_and_years() {
        let ner = HeuristicOpenIe
            .ner("chunk-1", "The Acme Corp acquired Widgets Inc in 2020.")
            .unwrap();
        assert_eq!(ner.unique_entities, vec!["Acme Corp", "Widgets Inc", "2020"]);
    }

    #[test]
    fn test_ner_skips_sentence_start_stopwords() {
        let ner = HeuristicOpenIe
            .ner("chunk-1", "However the plan failed. Then Berlin voted.")
            .unwrap();
        assert_eq!(ner.unique_entities, vec!["Berlin"]);
    }

    #[test]
    fn test_ner_quoted_terms() {
        let ner = HeuristicOpenIe
            .ner("chunk-1", r#"the project "night owl" shipped"#)
            .unwrap();
        assert_eq!(ner.unique_entities, vec!["night owl"]);
    }

    #[test]
    fn test_comma_breaks_run() {
        let ner = HeuristicOpenIe
            .ner("chunk-1", "visited Paris, London and Rome")
            .unwrap();
        assert_eq!(ner.unique_entities, vec!["Paris", "London", "Rome"]);
    }

    #[test]
    fn test_triples_link_consecutive_mentions() {
        let text = "Acme Corp acquired Widgets Inc in 2020. Widgets Inc makes Sprockets.";
        let ner = HeuristicOpenIe.ner("chunk-1", text).unwrap();
        let out = HeuristicOpenIe
            .triple_extraction("chunk-1", text, &ner.unique_entities)
            .unwrap();
        assert_eq!(
            out.triples,
            vec![
                vec!["Acme Corp".to_string(), "acquired".into(), "Widgets Inc".into()],
                vec!["Widgets Inc".to_string(), "in".into(), "2020".into()],
                vec!["Widgets Inc".to_string(), "makes".into(), "Sprockets".into()],
            ]
        );
    }

    #[test]
    fn test_triples_respect_entity_list() {
        let text = "Acme Corp acquired Widgets Inc.";
        let out = HeuristicOpenIe
            .triple_extraction("chunk-1", text, &["Acme Corp".to_string()])
            .unwrap();
        assert!(out.triples.is_empty());
    }
}
