//! Search relevance scoring.
//!
//! Scores are integers 0–100 keyed by listing id. The LLM scorer asks the
//! model to rate each candidate against the query; the keyword scorer is the
//! deterministic fallback used when no model is configured or the call fails.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use super::llm::{AnthropicClient, LlmError};

const MAX_DESCRIPTION_CHARS: usize = 200;
const MAX_REPLY_TOKENS: u32 = 1024;

const TITLE_WEIGHT: u32 = 3;
const CATEGORY_WEIGHT: u32 = 2;
const DESCRIPTION_WEIGHT: u32 = 1;

/// What the scorer sees of a listing
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub price_per_day_cents: i64,
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("could not parse scores from reply: {0}")]
    Parse(String),
}

#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Reported in search responses
    fn name(&self) -> &'static str;

    /// Score every candidate; ids missing from the result count as 0.
    async fn score(
        &self,
        query: &str,
        candidates: &[Candidate],
    ) -> Result<HashMap<Uuid, u8>, ScoringError>;
}

// ---------------------------------------------------------------------------
// Keyword scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordScorer;

/// Lowercased, de-duplicated alphanumeric terms in query order
#[must_use]
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .filter(|term| seen.insert(term.clone()))
        .collect()
}

impl KeywordScorer {
    /// Weighted term overlap normalised so a candidate matching every term in
    /// every field scores 100.
    #[must_use]
    pub fn score_one(terms: &[String], candidate: &Candidate) -> u8 {
        if terms.is_empty() {
            return 0;
        }
        let title = candidate.title.to_lowercase();
        let category = candidate.category.to_lowercase();
        let description = candidate.description.to_lowercase();

        let raw: u32 = terms
            .iter()
            .map(|term| {
                let mut weight = 0;
                if title.contains(term.as_str()) {
                    weight += TITLE_WEIGHT;
                }
                if category.contains(term.as_str()) {
                    weight += CATEGORY_WEIGHT;
                }
                if description.contains(term.as_str()) {
                    weight += DESCRIPTION_WEIGHT;
                }
                weight
            })
            .sum();

        let max = u32::try_from(terms.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(TITLE_WEIGHT + CATEGORY_WEIGHT + DESCRIPTION_WEIGHT);
        let scaled = (raw * 100 + max / 2) / max;
        u8::try_from(scaled.min(100)).unwrap_or(100)
    }

    #[must_use]
    pub fn score_all(query: &str, candidates: &[Candidate]) -> HashMap<Uuid, u8> {
        let terms = query_terms(query);
        candidates
            .iter()
            .map(|candidate| (candidate.id, Self::score_one(&terms, candidate)))
            .collect()
    }
}

#[async_trait]
impl RelevanceScorer for KeywordScorer {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn score(
        &self,
        query: &str,
        candidates: &[Candidate],
    ) -> Result<HashMap<Uuid, u8>, ScoringError> {
        Ok(Self::score_all(query, candidates))
    }
}

// ---------------------------------------------------------------------------
// LLM scoring
// ---------------------------------------------------------------------------

pub struct LlmRelevanceScorer {
    client: AnthropicClient,
}

impl LlmRelevanceScorer {
    pub fn new(client: AnthropicClient) -> Self {
        Self { client }
    }
}

fn system_prompt() -> &'static str {
    "You rank outdoor gear rental listings for a search query.\n\
     Rate how well each listing matches what the searcher wants, from 0 (irrelevant) \
     to 100 (exactly what they asked for). Consider synonyms and intended activity, \
     not just shared words.\n\
     Reply with only a JSON array, one object per listing: \
     [{\"id\": \"<listing id>\", \"score\": <0-100>}]"
}

fn truncate_chars(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{truncated}…")
    } else {
        truncated
    }
}

/// User message listing the query and each candidate on its own line
#[must_use]
pub fn build_prompt(query: &str, candidates: &[Candidate]) -> String {
    let mut prompt = format!("Search query: {query}\n\nListings:\n");
    for candidate in candidates {
        let description = truncate_chars(
            &candidate.description.replace('\n', " "),
            MAX_DESCRIPTION_CHARS,
        );
        prompt.push_str(&format!(
            "- id: {} | title: {} | category: {} | price/day: {}.{:02} | {}\n",
            candidate.id,
            candidate.title,
            candidate.category,
            candidate.price_per_day_cents / 100,
            candidate.price_per_day_cents % 100,
            description,
        ));
    }
    prompt
}

#[derive(Deserialize)]
struct ScoredId {
    id: String,
    score: f64,
}

/// Pull the first `[...]` JSON array out of the reply and map it to scores.
///
/// Ids that are not candidates are dropped; scores are clamped to 0–100.
///
/// # Errors
/// [`ScoringError::Parse`] when no well-formed array is present.
pub fn parse_scores(reply: &str, candidates: &[Candidate]) -> Result<HashMap<Uuid, u8>, ScoringError> {
    let start = reply
        .find('[')
        .ok_or_else(|| ScoringError::Parse("no JSON array in reply".to_string()))?;
    let end = reply
        .rfind(']')
        .filter(|&end| end > start)
        .ok_or_else(|| ScoringError::Parse("unterminated JSON array".to_string()))?;

    let entries: Vec<ScoredId> = serde_json::from_str(&reply[start..=end])
        .map_err(|e| ScoringError::Parse(e.to_string()))?;

    let known: HashSet<Uuid> = candidates.iter().map(|c| c.id).collect();
    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let id = Uuid::parse_str(entry.id.trim()).ok()?;
            known.contains(&id).then(|| {
                // Clamped to 0..=100 so the cast cannot truncate
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let score = entry.score.clamp(0.0, 100.0).round() as u8;
                (id, score)
            })
        })
        .collect())
}

#[async_trait]
impl RelevanceScorer for LlmRelevanceScorer {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn score(
        &self,
        query: &str,
        candidates: &[Candidate],
    ) -> Result<HashMap<Uuid, u8>, ScoringError> {
        if candidates.is_empty() {
            return Ok(HashMap::new());
        }
        let reply = self
            .client
            .complete(system_prompt(), &build_prompt(query, candidates), MAX_REPLY_TOKENS)
            .await?;
        parse_scores(&reply, candidates)
    }
}
