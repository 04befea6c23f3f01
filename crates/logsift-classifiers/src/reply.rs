//! Defensive parsing of fallback-service replies
//!
//! Replies are unstructured text that may contain delimited reasoning
//! segments (`<think>...</think>`), possibly truncated mid-stream. Parsing
//! runs as an explicit state machine so the truncated-block edge case is
//! reproducible in isolation:
//!
//! - `ExtractingAnswer`: copy answer text up to the next reasoning-open
//!   marker
//! - `AwaitingReasoningClose`: skip to the matching close marker; an
//!   unterminated block discards the remainder of the reply
//! - `HeuristicFallback`: the candidate answer is too short, so classify
//!   from keyword co-occurrence over the original unstripped reply
//! - `Done`: extract the first recognized category token from the candidate

use aho_corasick::AhoCorasick;
use logsift_core::{Category, CategorySet};

/// Reasoning segment delimiters
const REASONING_OPEN: &str = "<think>";
const REASONING_CLOSE: &str = "</think>";

/// A candidate answer shorter than this cannot hold any valid label
const MIN_ANSWER_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    ExtractingAnswer,
    AwaitingReasoningClose,
    HeuristicFallback,
    Done,
}

/// Parses raw fallback replies into categories; never fails
pub struct ReplyParser {
    categories: CategorySet,
    failure_terms: AhoCorasick,
    process_terms: AhoCorasick,
}

impl ReplyParser {
    /// Create a parser for the given category set
    pub fn new(categories: CategorySet) -> Self {
        // Both matchers are built from literal term lists and cannot fail.
        let failure_terms = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(["fail", "error"])
            .expect("literal term list");
        let process_terms = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(["case", "escalation"])
            .expect("literal term list");
        Self {
            categories,
            failure_terms,
            process_terms,
        }
    }

    /// Extract a category from a raw reply, degrading to `unclassified`
    pub fn parse(&self, raw: &str) -> Category {
        let mut remaining = raw;
        let mut candidate = String::new();
        let mut state = ParseState::ExtractingAnswer;

        loop {
            match state {
                ParseState::ExtractingAnswer => {
                    if let Some(open) = remaining.find(REASONING_OPEN) {
                        candidate.push_str(&remaining[..open]);
                        remaining = &remaining[open + REASONING_OPEN.len()..];
                        state = ParseState::AwaitingReasoningClose;
                    } else {
                        candidate.push_str(remaining);
                        state = self.answer_state(&candidate);
                    }
                }
                ParseState::AwaitingReasoningClose => {
                    if let Some(close) = remaining.find(REASONING_CLOSE) {
                        remaining = &remaining[close + REASONING_CLOSE.len()..];
                        state = ParseState::ExtractingAnswer;
                    } else {
                        // Truncated reasoning block: discard the rest.
                        state = self.answer_state(&candidate);
                    }
                }
                ParseState::HeuristicFallback => return self.heuristic(raw),
                ParseState::Done => return self.extract(candidate.trim()),
            }
        }
    }

    fn answer_state(&self, candidate: &str) -> ParseState {
        if candidate.trim().len() < MIN_ANSWER_LEN {
            ParseState::HeuristicFallback
        } else {
            ParseState::Done
        }
    }

    /// Keyword co-occurrence over the original unstripped reply
    fn heuristic(&self, raw: &str) -> Category {
        if self.failure_terms.is_match(raw) && self.process_terms.is_match(raw) {
            tracing::debug!("reply too short, keyword heuristic picked workflow_error");
            Category::new("workflow_error")
        } else {
            Category::unclassified()
        }
    }

    /// First recognized category token in the candidate answer
    fn extract(&self, candidate: &str) -> Category {
        self.categories
            .find_first_in(candidate)
            .unwrap_or_else(Category::unclassified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ReplyParser {
        ReplyParser::new(CategorySet::stock())
    }

    #[test]
    fn plain_answer_is_extracted() {
        assert_eq!(
            parser().parse("1. workflow_error"),
            Category::new("workflow_error")
        );
    }

    #[test]
    fn complete_reasoning_block_is_stripped() {
        let reply = "<think>the ticket failed, but let me weigh user_action \
                     against the alternatives</think>\n1. workflow_error";
        assert_eq!(parser().parse(reply), Category::new("workflow_error"));
    }

    #[test]
    fn truncated_reasoning_block_uses_keyword_heuristic() {
        let reply = "<think>the case escalation failed because the agent";
        assert_eq!(parser().parse(reply), Category::new("workflow_error"));
    }

    #[test]
    fn truncated_block_without_co_occurrence_is_unclassified() {
        // Failure terms without process terms do not trip the heuristic.
        let reply = "<think>this looks like some kind of error but";
        assert_eq!(parser().parse(reply), Category::unclassified());
    }

    #[test]
    fn unrecognizable_answer_is_unclassified() {
        assert_eq!(
            parser().parse("I am fairly confident about this one, chief."),
            Category::unclassified()
        );
    }

    #[test]
    fn spaced_category_names_are_recognized() {
        assert_eq!(
            parser().parse("That would be a Deprecation Warning."),
            Category::new("deprecation_warning")
        );
    }

    #[test]
    fn multiple_blocks_are_all_stripped() {
        let reply = "<think>first thought</think>1. user_action<think>second</think>";
        assert_eq!(parser().parse(reply), Category::new("user_action"));
    }

    #[test]
    fn short_answer_after_stripping_falls_back_to_heuristic() {
        // The visible remainder is under the minimum answer length, so the
        // original reply (including reasoning text) drives the heuristic.
        let reply = "<think>case escalation for ticket 7324 failed</think>ok";
        assert_eq!(parser().parse(reply), Category::new("workflow_error"));
    }
}
