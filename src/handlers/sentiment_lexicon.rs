//! Deterministic lexicon-based sentiment fallback, used whenever the model
//! adapter cannot deliver a numeric score in `[-1.0, 1.0]`.

const NEGATIVE_WORDS: &[&str] = &[
    "unacceptable", "angry", "furious", "terrible", "awful", "refund", "scam", "fraud",
    "disappointed", "worst", "horrible", "cancel", "complaint", "never", "frustrated",
];

const POSITIVE_WORDS: &[&str] = &[
    "thanks", "great", "excellent", "happy", "satisfied", "pleased", "good", "wonderful",
    "appreciate", "helpful",
];

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Scores `text` in `[-1.0, 1.0]` by counting lexicon hits and normalizing
/// by the number of hits, so a single strong word still produces a
/// decisive score rather than being diluted by sentence length.
pub fn score(text: &str) -> f64 {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return 0.0;
    }

    let mut negative = 0i32;
    let mut positive = 0i32;
    for token in &tokens {
        if NEGATIVE_WORDS.contains(&token.as_str()) {
            negative += 1;
        }
        if POSITIVE_WORDS.contains(&token.as_str()) {
            positive += 1;
        }
    }

    let hits = negative + positive;
    if hits == 0 {
        return 0.0;
    }

    ((positive - negative) as f64 / hits as f64).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strongly_negative_message_scores_at_or_below_threshold() {
        let s = score("This is absolutely unacceptable, I want my money back now");
        assert!(s <= -0.5, "expected strongly negative score, got {s}");
    }

    #[test]
    fn neutral_message_scores_zero() {
        assert_eq!(score("The transfer completed at noon"), 0.0);
    }

    #[test]
    fn positive_message_scores_positive() {
        let s = score("Thanks, that was great and very helpful");
        assert!(s > 0.0);
    }
}
