// src/services/grading.rs

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Option labels an MCQ question carries, in display order.
pub const OPTION_LABELS: [&str; 5] = ["A", "B", "C", "D", "E"];

/// A submitted answer as it arrives on the wire.
///
/// MCQ answers come either as a single label (`"b"`, or `"A,C"` for a
/// multi-select typed by hand) or as a list of labels (`["A", "c"]`).
/// Short answers are free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedAnswer {
    Labels(Vec<String>),
    Text(String),
}

impl SubmittedAnswer {
    pub fn is_blank(&self) -> bool {
        match self {
            SubmittedAnswer::Labels(labels) => labels.iter().all(|l| l.trim().is_empty()),
            SubmittedAnswer::Text(text) => text.trim().is_empty(),
        }
    }
}

/// Canonical label set: trimmed, upper-cased, de-duplicated, sorted.
pub fn normalize_labels(answer: &SubmittedAnswer) -> BTreeSet<String> {
    let raw: Vec<&str> = match answer {
        SubmittedAnswer::Labels(labels) => labels.iter().map(String::as_str).collect(),
        SubmittedAnswer::Text(text) => text.split(',').collect(),
    };

    raw.into_iter()
        .map(|label| label.trim().to_uppercase())
        .filter(|label| !label.is_empty())
        .collect()
}

pub fn is_option_label(label: &str) -> bool {
    OPTION_LABELS.contains(&label)
}

/// The stored key a submission is graded against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    /// Correct option labels, already normalized.
    Mcq(BTreeSet<String>),
    /// Short answers are not graded automatically.
    Short,
}

impl AnswerKey {
    pub fn mcq<S: AsRef<str>>(correct_options: &[S]) -> Self {
        AnswerKey::Mcq(
            correct_options
                .iter()
                .map(|label| label.as_ref().trim().to_uppercase())
                .filter(|label| !label.is_empty())
                .collect(),
        )
    }

    /// `None` for short answers, otherwise set equality against the key.
    pub fn grade(&self, answer: &SubmittedAnswer) -> Option<bool> {
        match self {
            AnswerKey::Short => None,
            AnswerKey::Mcq(correct) => Some(normalize_labels(answer) == *correct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> SubmittedAnswer {
        SubmittedAnswer::Text(s.to_string())
    }

    fn labels(ls: &[&str]) -> SubmittedAnswer {
        SubmittedAnswer::Labels(ls.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn lowercase_single_label_matches() {
        let key = AnswerKey::mcq(&["B"]);
        assert_eq!(key.grade(&text("b")), Some(true));
        assert_eq!(key.grade(&text("  B ")), Some(true));
        assert_eq!(key.grade(&text("C")), Some(false));
    }

    #[test]
    fn multi_select_is_order_and_case_independent() {
        let key = AnswerKey::mcq(&["A", "C", "E"]);
        assert_eq!(key.grade(&labels(&["e", "a", " C"])), Some(true));
        assert_eq!(key.grade(&text("c, e ,a")), Some(true));
        assert_eq!(key.grade(&labels(&["A", "C"])), Some(false));
        assert_eq!(key.grade(&labels(&["A", "C", "D", "E"])), Some(false));
    }

    #[test]
    fn duplicates_collapse() {
        let key = AnswerKey::mcq(&["D"]);
        assert_eq!(key.grade(&labels(&["d", "D"])), Some(true));
    }

    #[test]
    fn empty_submission_is_incorrect() {
        let key = AnswerKey::mcq(&["A"]);
        assert_eq!(key.grade(&text("")), Some(false));
        assert_eq!(key.grade(&labels(&[])), Some(false));
    }

    #[test]
    fn short_answers_are_ungraded() {
        assert_eq!(AnswerKey::Short.grade(&text("anything")), None);
    }

    #[test]
    fn every_ordering_of_the_key_grades_true() {
        let key = AnswerKey::mcq(&["B", "D", "E"]);
        let orders = [
            ["B", "D", "E"],
            ["B", "E", "D"],
            ["D", "B", "E"],
            ["D", "E", "B"],
            ["E", "B", "D"],
            ["E", "D", "B"],
        ];
        for order in orders {
            let lower: Vec<String> = order.iter().map(|l| l.to_lowercase()).collect();
            assert_eq!(key.grade(&labels(&order)), Some(true));
            assert_eq!(key.grade(&SubmittedAnswer::Labels(lower)), Some(true));
        }
    }

    #[test]
    fn answer_shapes_deserialize() {
        let single: SubmittedAnswer = serde_json::from_str("\"b\"").unwrap();
        assert_eq!(single, text("b"));
        let many: SubmittedAnswer = serde_json::from_str("[\"a\",\"c\"]").unwrap();
        assert_eq!(many, labels(&["a", "c"]));
    }

    #[test]
    fn blank_detection() {
        assert!(text("   ").is_blank());
        assert!(labels(&[" "]).is_blank());
        assert!(!labels(&["A"]).is_blank());
    }
}
