//! Character-to-token approximation with a safety margin.

use crate::config::ContextConfig;

/// `estimateTokens(text) = ceil(len(text)/4)`, counting codepoints.
pub fn estimate_tokens(text: &str, config: &ContextConfig) -> u32 {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        return 0;
    }
    let per_token = config.chars_per_token.max(1);
    (chars + per_token - 1) / per_token
}

/// `effectiveLimit = floor(limit * SAFETY_MARGIN)`.
pub fn effective_limit(limit: u32, config: &ContextConfig) -> u32 {
    (limit as f64 * config.safety_margin).floor() as u32
}

/// Whether `text` fits within `limit`'s safety-margined budget.
pub fn validate_text(text: &str, limit: u32, config: &ContextConfig) -> bool {
    estimate_tokens(text, config) <= effective_limit(limit, config)
}

/// Joins `texts` with `"\n\n"` before estimating, matching the
/// accumulated-context concatenation used in Phase 3 and Phase 4.
pub fn validate_multiple_texts(texts: &[&str], limit: u32, config: &ContextConfig) -> bool {
    validate_text(&texts.join("\n\n"), limit, config)
}

/// Tokens remaining under `limit`'s effective budget after `used`.
pub fn remaining(used: u32, limit: u32, config: &ContextConfig) -> u32 {
    effective_limit(limit, config).saturating_sub(used)
}

/// Whether `additional` tokens fit within what remains.
pub fn can_add(used: u32, additional: u32, limit: u32, config: &ContextConfig) -> bool {
    used.saturating_add(additional) <= effective_limit(limit, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero_tokens() {
        assert_eq!(estimate_tokens("", &ContextConfig::default()), 0);
    }

    #[test]
    fn estimate_is_monotone() {
        let config = ContextConfig::default();
        let shorter = estimate_tokens("hi", &config);
        let longer = estimate_tokens("hi there friend", &config);
        assert!(longer >= shorter);
    }

    #[test]
    fn passes_exactly_at_effective_limit() {
        let config = ContextConfig::default();
        // limit=1000 -> effective=900 tokens -> 3600 chars exactly fits.
        let text = "a".repeat(3600);
        assert!(validate_text(&text, 1000, &config));
        let text = "a".repeat(3604);
        assert!(!validate_text(&text, 1000, &config));
    }

    #[test]
    fn joins_with_blank_line_before_estimating() {
        let config = ContextConfig::default();
        let joined = validate_multiple_texts(&["a", "b"], 100, &config);
        let single = validate_text("a\n\nb", 100, &config);
        assert_eq!(joined, single);
    }
}
