use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Structural signals pulled out of an issue body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSignals {
    pub has_steps_to_reproduce: bool,
    pub has_expected_vs_actual: bool,
    pub has_stack_trace: bool,
    pub has_code_block: bool,
    pub env_detail_count: u32,
}

/// Compiled once; the extractor runs for every dirty issue in a batch.
mod patterns {
    use super::*;

    pub static REPRO: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)(steps\s+to\s+reproduce|how\s+to\s+reproduce|reproduction\s+steps|repro\s+steps|minimal\s+reproduc|expected\s+behavio[ur]|actual\s+behavio[ur])",
        )
        .expect("Invalid reproduction regex")
    });

    pub static CODE_BLOCK: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"```[\s\S]*?```").expect("Invalid code block regex"));

    pub static STACK_TRACE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)(Traceback \(most recent call last\)|at .+\(.+:\d+\)|Error:.*\n\s+at |Exception in thread|panic:|FATAL ERROR)",
        )
        .expect("Invalid stack trace regex")
    });

    pub static EXPECTED_VS_ACTUAL: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)(expected\s*(behavio[ur]|result|output)|actual\s*(behavio[ur]|result|output)|expected:.*actual:|got:.*expected:)",
        )
        .expect("Invalid expected/actual regex")
    });

    pub static ENV_DETAIL: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)(node[. ]?v?\d|python\s*\d|npm\s*v?\d|os[:\s]|platform[:\s]|version[:\s]|browser[:\s]|chrome\s*\d|firefox\s*\d|safari\s*\d|windows|macos|linux|ubuntu|docker)",
        )
        .expect("Invalid environment regex")
    });
}

/// Extract text signals from an issue body. Missing or empty text yields all-false/zero.
pub fn extract_features(body: Option<&str>) -> TextSignals {
    let body = match body {
        Some(b) if !b.is_empty() => b,
        _ => return TextSignals::default(),
    };

    TextSignals {
        has_steps_to_reproduce: patterns::REPRO.is_match(body),
        has_expected_vs_actual: patterns::EXPECTED_VS_ACTUAL.is_match(body),
        has_stack_trace: patterns::STACK_TRACE.is_match(body),
        has_code_block: patterns::CODE_BLOCK.is_match(body),
        env_detail_count: patterns::ENV_DETAIL.find_iter(body).count() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_missing_body() {
        assert_eq!(extract_features(None), TextSignals::default());
        assert_eq!(extract_features(Some("")), TextSignals::default());
    }

    #[test]
    fn test_steps_to_reproduce_case_insensitive() {
        let f = extract_features(Some("## STEPS TO REPRODUCE\n1. run it"));
        assert!(f.has_steps_to_reproduce);

        let f = extract_features(Some("Here is a minimal reproduction of the bug"));
        assert!(f.has_steps_to_reproduce);

        let f = extract_features(Some("It just crashes sometimes"));
        assert!(!f.has_steps_to_reproduce);
    }

    #[test]
    fn test_expected_vs_actual() {
        let f = extract_features(Some("Expected result: 1\nActual result: 2"));
        assert!(f.has_expected_vs_actual);

        let f = extract_features(Some("got: 3 but expected: 4"));
        assert!(f.has_expected_vs_actual);

        let f = extract_features(Some("nothing to see"));
        assert!(!f.has_expected_vs_actual);
    }

    #[test]
    fn test_stack_trace_idioms() {
        let py = "Traceback (most recent call last):\n  File \"x.py\", line 1";
        assert!(extract_features(Some(py)).has_stack_trace);

        let js = "TypeError: x is undefined\n    at foo (app.js:10:5)";
        assert!(extract_features(Some(js)).has_stack_trace);

        let go = "panic: runtime error: index out of range";
        assert!(extract_features(Some(go)).has_stack_trace);

        let java = "Exception in thread \"main\" java.lang.NullPointerException";
        assert!(extract_features(Some(java)).has_stack_trace);

        assert!(!extract_features(Some("works fine")).has_stack_trace);
    }

    #[test]
    fn test_code_block_spans_newlines() {
        let body = "before\n```rust\nfn main() {}\n```\nafter";
        assert!(extract_features(Some(body)).has_code_block);

        let unterminated = "```rust\nfn main() {}";
        assert!(!extract_features(Some(unterminated)).has_code_block);
    }

    #[test]
    fn test_env_details_counted_not_deduplicated() {
        let body = "OS: Ubuntu 22.04\nlinux and linux again\nnode v18";
        // "OS:", "Ubuntu", "linux", "linux", "node v1"
        assert_eq!(extract_features(Some(body)).env_detail_count, 5);

        assert_eq!(extract_features(Some("docker")).env_detail_count, 1);
        assert_eq!(extract_features(Some("nothing here")).env_detail_count, 0);
    }
}
