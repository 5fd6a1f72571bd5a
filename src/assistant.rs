// Mock chat bot and dream-to-product generator.
// Canned, rule-based answers; a real deployment swaps these for an LLM behind the backend.

use crate::error::{Result, StorefrontError};
use crate::types::*;

pub const THINKING: &str = "Thinking...";
pub const GENERATING: &str = "Generating handcrafted suggestions…";
pub const CHAT_UNAVAILABLE: &str = "Sorry, I could not answer that right now. Please ask again.";
pub const DREAM_UNAVAILABLE: &str = "Could not generate suggestions right now. Try again.";

const CARE_ANSWER: &str =
    "We recommend hand-washing or mild detergent for our textiles. Wood and glass pieces only need a soft dry cloth.";
const BARGAIN_ANSWER: &str =
    "For bargaining, start at 80% and be polite; sellers value relationships.";
const DEFAULT_ANSWER: &str = "We recommend hand-washing or mild detergent for our textiles. For bargaining, start at 80% and be polite; sellers value relationships.";

struct AnswerRule {
    keywords: &'static [&'static str],
    answer: &'static str,
}

const ANSWER_RULES: &[AnswerRule] = &[
    AnswerRule {
        keywords: &["wash", "clean", "care", "detergent"],
        answer: CARE_ANSWER,
    },
    AnswerRule {
        keywords: &["bargain", "negotiat", "price", "discount", "offer", "cheap"],
        answer: BARGAIN_ANSWER,
    },
];

/// Trim a required text field, rejecting blanks with the given message.
pub fn required_text<'a>(text: &'a str, message: &str) -> Result<&'a str> {
    let text = text.trim();
    if text.is_empty() {
        Err(StorefrontError::invalid_input(message))
    } else {
        Ok(text)
    }
}

/// Canned answer for a chat prompt. First matching rule wins.
pub fn chat_answer(prompt: &str) -> Result<String> {
    let prompt = required_text(prompt, "Type a question first")?.to_lowercase();
    let answer = ANSWER_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| prompt.contains(k)))
        .map(|rule| rule.answer)
        .unwrap_or(DEFAULT_ANSWER);
    Ok(answer.to_string())
}

/// Turn a free-text dream into product ideas.
pub fn dream_suggestions(text: &str) -> Result<Vec<DreamSuggestion>> {
    let text = required_text(text, "Describe your dream or need.")?;
    let words: Vec<&str> = text.split_whitespace().collect();
    let lead = |n: usize| words.iter().take(n).copied().collect::<Vec<_>>().join(" ");

    Ok(vec![
        DreamSuggestion {
            title: format!("Custom {} Lamp", lead(3)),
            description: "Locally carved mango wood with warli etchings".to_string(),
            estimated_price: Price::new(1999),
        },
        DreamSuggestion {
            title: format!("Artisan {} Set", lead(2)),
            description: "Hand-painted by village artisans".to_string(),
            estimated_price: Price::new(899),
        },
    ])
}
