//! Splits free-form assistant text into an answer and a list of suggested follow-ups.
//!
//! The model is prompted to close its answer with a heading such as
//! `Follow-up Questions:` followed by a numbered list. Nothing enforces that, so the split
//! is purely textual and must degrade to "whole text is the answer" when no heading is
//! present. The function is pure and cheap enough to rerun on every render, including on
//! partially streamed text.
use std::sync::LazyLock;

use regex::Regex;

/// Recognized follow-up headings, longest first so that two headings starting at the same
/// offset resolve to the more specific one.
pub const FOLLOWUP_HEADINGS: [&str; 4] = [
    "suggested follow-up questions",
    "relevant follow-up questions",
    "you may also want to explore",
    "follow-up questions",
];

// Optional markdown decoration (`## `, `**`, `__`) belongs to the heading.
static HEADING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = FOLLOWUP_HEADINGS
        .iter()
        .map(|heading| regex::escape(heading))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?i)(?:#{{1,6}}[ \t]*)?(?:\*\*|__)?(?:{alternatives})(?:\*\*|__)?[ \t]*:?(?:\*\*|__)?"
    ))
    .expect("invalid HEADING_PATTERN regex")
});

static ORDINAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s*").expect("invalid ORDINAL_PATTERN regex"));

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentedOutput {
    pub answer: String,
    pub followups: Vec<String>,
}

impl SegmentedOutput {
    pub fn has_followups(&self) -> bool {
        !self.followups.is_empty()
    }

    /// Follow-ups renumbered from 1 for display.
    pub fn numbered_followups(&self) -> Vec<String> {
        self.followups
            .iter()
            .enumerate()
            .map(|(index, followup)| format!("{}. {followup}", index + 1))
            .collect()
    }
}

pub fn segment(raw: &str) -> SegmentedOutput {
    // Only the first heading counts, even if the phrase also occurs inside the answer.
    let Some(heading) = HEADING_PATTERN.find(raw) else {
        return SegmentedOutput {
            answer: raw.trim().to_string(),
            followups: Vec::new(),
        };
    };

    let followups = raw[heading.end()..]
        .lines()
        .map(|line| ORDINAL_PATTERN.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    SegmentedOutput {
        answer: raw[..heading.start()].trim().to_string(),
        followups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn followups(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn text_without_heading_is_all_answer() {
        assert_eq!(
            segment("What can it do?"),
            SegmentedOutput {
                answer: "What can it do?".to_string(),
                followups: Vec::new(),
            }
        );
        assert_eq!(segment("  padded \n").answer, "padded");
    }

    #[test]
    fn splits_answer_and_numbered_followups() {
        let output = segment(
            "Margins rose 2pp.\nFollow-up Questions:\n1. What drove the rise?\n2. How does it compare to peers?",
        );
        assert_eq!(output.answer, "Margins rose 2pp.");
        assert_eq!(
            output.followups,
            followups(&["What drove the rise?", "How does it compare to peers?"])
        );
    }

    #[test]
    fn heading_only_text_has_empty_answer() {
        let output = segment("Relevant follow-up questions:\n1. A?\n2. B?");
        assert_eq!(output.answer, "");
        assert_eq!(output.followups, followups(&["A?", "B?"]));
    }

    #[test]
    fn heading_without_lines_keeps_answer() {
        let output = segment("Volumes grew 6% YoY.\n\nSuggested follow-up questions:\n\n");
        assert_eq!(output.answer, "Volumes grew 6% YoY.");
        assert!(!output.has_followups());
    }

    #[test]
    fn every_heading_variant_is_recognized_case_insensitively() {
        for heading in [
            "FOLLOW-UP QUESTIONS",
            "Suggested Follow-up Questions:",
            "relevant follow-up questions",
            "You may also want to explore:",
        ] {
            let output = segment(&format!("Answer.\n{heading}\n1. Next?"));
            assert_eq!(output.answer, "Answer.", "{heading}");
            assert_eq!(output.followups, followups(&["Next?"]), "{heading}");
        }
    }

    #[test]
    fn earliest_heading_wins() {
        let output = segment(
            "Intro.\nYou may also want to explore:\n1. Capex plans\nFollow-up questions:\n2. Debt?",
        );
        assert_eq!(output.answer, "Intro.");
        assert_eq!(
            output.followups,
            followups(&["Capex plans", "Follow-up questions:", "Debt?"])
        );
    }

    #[test]
    fn specific_heading_wins_over_its_suffix() {
        let output = segment("Suggested follow-up questions:\n1. Why?");
        assert_eq!(output.answer, "");
        assert_eq!(output.followups, followups(&["Why?"]));
    }

    #[test]
    fn first_occurrence_counts_even_inside_prose() {
        let output = segment(
            "I will list follow-up questions at the end.\nFollow-up Questions:\n1. Q?",
        );
        assert_eq!(output.answer, "I will list");
        assert_eq!(
            output.followups,
            followups(&["at the end.", "Follow-up Questions:", "Q?"])
        );
    }

    #[test]
    fn markdown_decoration_stays_with_the_heading() {
        for heading in [
            "**Follow-up Questions:**",
            "**Follow-up Questions**:",
            "### Follow-up questions",
            "__Relevant follow-up questions__",
        ] {
            let output = segment(&format!("Gross margin: 52%.\n\n{heading}\n1. Outlook?"));
            assert_eq!(output.answer, "Gross margin: 52%.", "{heading}");
            assert_eq!(output.followups, followups(&["Outlook?"]), "{heading}");
        }
    }

    #[test]
    fn strips_ordinals_and_skips_blank_or_bare_markers() {
        let output = segment("A.\nFollow-up questions:\n  1.   First?\n\n2.\n  Second?  \n10. Tenth?");
        assert_eq!(output.followups, followups(&["First?", "Second?", "Tenth?"]));
    }

    #[test]
    fn non_ordinal_numbers_are_kept() {
        let output = segment("A.\nFollow-up questions:\n2024 guidance?\n3) Capex?");
        assert_eq!(output.followups, followups(&["2024 guidance?", "3) Capex?"]));
    }

    #[test]
    fn repeated_segmentation_is_identical() {
        let samples = [
            "",
            "plain",
            "x\nFollow-up questions:\n1. y",
            "**Follow-up Questions:**",
            "partial answer mid-stream\nFollow-up Ques",
        ];
        for sample in samples {
            assert_eq!(segment(sample), segment(sample));
        }
    }

    #[test]
    fn partial_heading_mid_stream_is_not_split() {
        let output = segment("Revenue up 9%.\nFollow-up Ques");
        assert_eq!(output.answer, "Revenue up 9%.\nFollow-up Ques");
        assert!(output.followups.is_empty());
    }

    #[test]
    fn numbered_followups_restart_at_one() {
        let output = segment("A.\nFollow-up questions:\n3. C?\n7. D?");
        assert_eq!(output.numbered_followups(), vec!["1. C?", "2. D?"]);
    }
}
