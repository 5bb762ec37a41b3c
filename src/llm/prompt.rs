//! Prompt construction and answer parsing shared by every provider.
//!
//! The prompt is deterministic for a given query so that every provider
//! sees exactly the same instructions. Parsing is lenient: anything that
//! does not name an outcome becomes a low-trust INVALID vote rather than
//! a provider failure.

use crate::types::{MarketQuery, Outcome, Vote};

/// Confidence assigned when the model named no outcome at all.
pub const UNPARSEABLE_CONFIDENCE: u8 = 10;

/// System instructions for resolving a market question.
pub fn system_prompt() -> &'static str {
    "You are an impartial oracle resolving prediction market questions. \
     Decide whether the question has resolved YES or NO based on facts.\n\n\
     RULES:\n\
     1. Answer with exactly one word: YES, NO or INVALID.\n\
     2. Answer INVALID if the question is ambiguous, unresolvable, or not yet determinable.\n\
     3. Do not explain your answer."
}

/// Build the user prompt. `context` is included verbatim when present.
pub fn build_prompt(query: &MarketQuery) -> String {
    let mut prompt = String::with_capacity(256 + query.question.len());

    prompt.push_str(&format!("QUESTION: \"{}\"\n", query.question.trim()));

    if let Some(context) = query.context.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str("CONTEXT:\n");
        prompt.push_str(context);
        prompt.push('\n');
    }

    prompt.push_str("\nAnswer with exactly one word: YES, NO or INVALID.");
    prompt
}

/// How an outcome was recovered from the model's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedAnswer {
    /// A keyword was found.
    Keyword(Outcome),
    /// No keyword; treated as INVALID.
    Unparseable,
}

impl ParsedAnswer {
    pub fn outcome(self) -> Outcome {
        match self {
            ParsedAnswer::Keyword(outcome) => outcome,
            ParsedAnswer::Unparseable => Outcome::Invalid,
        }
    }
}

/// Parse a model answer into an outcome.
///
/// An answer that is exactly one keyword wins outright. Otherwise the first
/// whole-word `yes`/`no` is used, then an `invalid` token, case-insensitive.
/// Whole-word matching keeps "cannot" or "know" from reading as NO.
pub fn parse_outcome(text: &str) -> ParsedAnswer {
    let words: Vec<String> = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect();

    let keyword = |w: &str| w.parse::<Outcome>().ok();

    if let [only] = words.as_slice() {
        if let Some(outcome) = keyword(only) {
            return ParsedAnswer::Keyword(outcome);
        }
    }

    if let Some(outcome) = words
        .iter()
        .filter_map(|w| keyword(w))
        .find(|o| o.is_decisive())
    {
        return ParsedAnswer::Keyword(outcome);
    }

    if words.iter().any(|w| w == "invalid") {
        return ParsedAnswer::Keyword(Outcome::Invalid);
    }

    ParsedAnswer::Unparseable
}

/// Turn a raw answer into a vote carrying the provider's static confidence.
pub fn vote_from_text(source_id: String, text: &str, confidence: u8) -> Vote {
    let parsed = parse_outcome(text);
    let confidence = match parsed {
        ParsedAnswer::Keyword(_) => confidence,
        ParsedAnswer::Unparseable => UNPARSEABLE_CONFIDENCE.min(confidence),
    };

    Vote {
        source_id,
        outcome: parsed.outcome(),
        confidence,
        raw_text: text.trim().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
