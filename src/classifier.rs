//! Keyword-scoring persona detection.
//!
//! Each specialist persona scores one point per keyword found anywhere in the
//! lower-cased message. Matching is plain substring search, so a keyword also
//! hits inside longer words ("work" in "networking"). Only a strict winner is
//! reported; ties and empty scores fall back to [`Persona::Neutral`].

use anyhow::{Result, bail};
use itertools::Itertools;
use std::collections::HashMap;
use tracing::debug;

use crate::persona::Persona;

#[derive(Debug, Clone)]
pub struct KeywordSets {
    sets: Vec<(Persona, Vec<String>)>,
}

impl KeywordSets {
    /// Validates and normalises keyword lists: every specialist needs a
    /// non-empty set, keywords are lower-cased and deduplicated.
    pub fn new(mut sets: HashMap<Persona, Vec<String>>) -> Result<Self> {
        if sets.contains_key(&Persona::Neutral) {
            bail!("The neutral persona cannot have keywords");
        }

        let sets = Persona::SPECIALISTS
            .iter()
            .map(|&persona| {
                let keywords = sets.remove(&persona).unwrap_or_default();
                if keywords.is_empty() {
                    bail!("No keywords configured for persona '{persona}'");
                }
                if keywords.iter().any(|keyword| keyword.trim().is_empty()) {
                    bail!("Empty keyword configured for persona '{persona}'");
                }
                let keywords = keywords
                    .iter()
                    .map(|keyword| keyword.to_lowercase())
                    .unique()
                    .collect::<Vec<_>>();
                Ok((persona, keywords))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { sets })
    }

    #[cfg(test)]
    pub fn get(&self, persona: Persona) -> &[String] {
        self.sets
            .iter()
            .find(|(candidate, _)| *candidate == persona)
            .map(|(_, keywords)| keywords.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ModeClassifier {
    keywords: KeywordSets,
}

impl ModeClassifier {
    pub fn new(keywords: KeywordSets) -> Self {
        Self { keywords }
    }

    /// Keyword hit count per specialist persona.
    pub fn scores(&self, message: &str) -> Vec<(Persona, usize)> {
        let lower = message.to_lowercase();
        self.keywords
            .sets
            .iter()
            .map(|(persona, keywords)| {
                let score = keywords
                    .iter()
                    .filter(|keyword| lower.contains(keyword.as_str()))
                    .count();
                (*persona, score)
            })
            .collect()
    }

    pub fn classify(&self, message: &str) -> Persona {
        let scores = self.scores(message);
        let best = scores.iter().map(|(_, score)| *score).max().unwrap_or(0);
        let leaders = scores
            .iter()
            .filter(|(_, score)| *score == best)
            .collect::<Vec<_>>();

        let persona = match leaders.as_slice() {
            [(persona, _)] if best > 0 => *persona,
            _ => Persona::Neutral,
        };

        debug!(?scores, %persona, "Classified message");
        persona
    }
}
