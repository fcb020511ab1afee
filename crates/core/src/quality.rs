//! Turn Quality Scoring
//!
//! Heuristic score in `[0, 1]` for a prompt/response pair. The score is
//! computed once at ingest and gates shard graduation, so it must stay
//! deterministic and free of I/O.
//!
//! ```text
//! quality = 0.6 * length_score + 0.4 * ratio_score
//! ```
//!
//! Lengths are counted in characters of the whitespace-trimmed text.

/// Weight of the response-length component.
const LENGTH_WEIGHT: f64 = 0.6;

/// Weight of the response/prompt ratio component.
const RATIO_WEIGHT: f64 = 0.4;

/// Score a prompt/response pair.
///
/// An empty or whitespace-only response always scores `0.0`.
pub fn score(prompt: &str, response: &str) -> f64 {
    let response = response.trim();
    if response.is_empty() {
        return 0.0;
    }

    let response_len = response.chars().count();
    let prompt_len = prompt.trim().chars().count().max(1);

    let ratio = response_len as f64 / prompt_len as f64;
    let quality =
        LENGTH_WEIGHT * length_score(response_len) + RATIO_WEIGHT * ratio_score(ratio);

    quality.clamp(0.0, 1.0)
}

/// Short answers score low; returns diminish past ~200 characters.
fn length_score(len: usize) -> f64 {
    match len {
        0..=9 => 0.1,
        10..=49 => 0.3,
        50..=199 => 0.5 + 0.3 * (len - 50) as f64 / 150.0,
        _ => 0.8,
    }
}

fn ratio_score(ratio: f64) -> f64 {
    if ratio < 0.3 {
        // likely a non-answer
        0.2
    } else if ratio > 10.0 {
        // likely rambling
        0.6
    } else {
        0.7
    }
}
