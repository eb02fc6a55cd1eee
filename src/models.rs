//! Data models for the notebook.
//!
//! This module contains the line records that make up a notebook document,
//! the feedback and hint annotations keyed by line id, and the wire shapes
//! exchanged with the reasoning service and the browser.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Length of generated line ids.
pub const LINE_ID_LEN: usize = 16;

// ============================================================================
// Lines
// ============================================================================

/// Opaque, stable identifier of a line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(LINE_ID_LEN)
            .map(char::from)
            .collect();
        LineId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LineId {
    fn from(s: &str) -> Self {
        LineId(s.to_string())
    }
}

impl From<String> for LineId {
    fn from(s: String) -> Self {
        LineId(s)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Header,
    #[default]
    Text,
    Math,
    Image,
    Break,
}

impl LineKind {
    pub const ALL: [LineKind; 5] = [
        LineKind::Header,
        LineKind::Text,
        LineKind::Math,
        LineKind::Image,
        LineKind::Break,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LineKind::Header => "header",
            LineKind::Text => "text",
            LineKind::Math => "math",
            LineKind::Image => "image",
            LineKind::Break => "break",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Headers and breaks never count as problem context or as work.
    pub fn is_structural(self) -> bool {
        matches!(self, LineKind::Header | LineKind::Break)
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the notebook. Serializes to the persisted line shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub content: String,
    #[serde(rename = "mode")]
    pub kind: LineKind,
    /// Stored flag; see [`Line::is_problem`] for the effective value.
    #[serde(rename = "isProblem", default)]
    pub is_problem_context: bool,
}

impl Line {
    pub fn new(kind: LineKind, content: impl Into<String>) -> Self {
        Self {
            id: LineId::generate(),
            content: content.into(),
            kind,
            is_problem_context: false,
        }
    }

    /// The placeholder line of an otherwise empty document.
    pub fn empty() -> Self {
        Self::new(LineKind::Text, "")
    }

    pub fn problem(kind: LineKind, content: impl Into<String>) -> Self {
        Self {
            is_problem_context: true,
            ..Self::new(kind, content)
        }
    }

    pub fn with_id(mut self, id: impl Into<LineId>) -> Self {
        self.id = id.into();
        self
    }

    /// Effective problem-context flag: always false for headers and breaks.
    pub fn is_problem(&self) -> bool {
        self.is_problem_context && !self.kind.is_structural()
    }

    /// True for the student's own reasoning lines.
    pub fn is_work(&self) -> bool {
        !self.is_problem() && !self.kind.is_structural()
    }

    pub fn is_break(&self) -> bool {
        self.kind == LineKind::Break
    }
}

// ============================================================================
// Annotations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Ok,
    Issue,
}

/// A verdict attached to a work line after a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub status: FeedbackStatus,
    #[serde(rename = "latex", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Feedback {
    pub fn ok() -> Self {
        Self {
            status: FeedbackStatus::Ok,
            message: None,
        }
    }

    pub fn issue(message: impl Into<String>) -> Self {
        Self {
            status: FeedbackStatus::Issue,
            message: Some(message.into()),
        }
    }
}

pub type FeedbackMap = BTreeMap<LineId, Feedback>;
pub type HintMap = BTreeMap<LineId, String>;

/// Progress of a reasoning check for one target line. A failed check
/// returns the line to `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckState {
    #[default]
    Idle,
    Checking,
    SettledOk,
    SettledIssue,
}

// ============================================================================
// Reasoning Service Wire Types
// ============================================================================

/// A given line, sent without its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemLine {
    pub mode: LineKind,
    pub content: String,
}

/// A work line; its 1-indexed position is its step number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkLine {
    pub mode: LineKind,
    pub content: String,
    #[serde(rename = "lineId")]
    pub line_id: LineId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    #[serde(default)]
    pub problem_lines: Vec<ProblemLine>,
    #[serde(default)]
    pub user_lines: Vec<WorkLine>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hints: HintMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintRequest {
    #[serde(default)]
    pub problem_lines: Vec<ProblemLine>,
    #[serde(default)]
    pub user_lines: Vec<WorkLine>,
    /// Verdicts already shown, so the hint can address a flagged step.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feedback: FeedbackMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepIssue {
    #[serde(rename = "stepIndex")]
    pub step_index: usize,
    #[serde(rename = "latex")]
    pub message: String,
}

/// Normalized result of a reasoning check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckOutcome {
    Ok,
    Issue { issues: Vec<StepIssue> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintOutcome {
    #[serde(rename = "hint")]
    pub text: String,
}

/// Problem and work lines of one section, up to and including a target line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContext {
    pub problem_lines: Vec<ProblemLine>,
    pub work_lines: Vec<WorkLine>,
    pub hints: HintMap,
    pub feedback: FeedbackMap,
}

// ============================================================================
// Edit Requests
// ============================================================================

/// A line without an id, as typed or pasted by the user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineDraft {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mode: LineKind,
    #[serde(rename = "isProblem", default)]
    pub is_problem: bool,
}

impl LineDraft {
    pub fn into_line(self) -> Line {
        Line {
            is_problem_context: self.is_problem,
            ..Line::new(self.mode, self.content)
        }
    }
}

/// One Line Store mutation, as sent by the browser.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LineEdit {
    InsertAfter {
        index: usize,
        #[serde(flatten)]
        line: LineDraft,
    },
    Delete {
        index: usize,
    },
    UpdateContent {
        index: usize,
        content: String,
    },
    UpdateKind {
        index: usize,
        mode: LineKind,
    },
    ToggleProblemContext {
        index: usize,
    },
    ReplaceAll {
        lines: Vec<LineDraft>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = LineId::generate();
        let b = LineId::generate();
        assert_eq!(a.as_str().len(), LINE_ID_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_structural_lines_ignore_problem_flag() {
        let header = Line {
            is_problem_context: true,
            ..Line::new(LineKind::Header, "Problem 1")
        };
        assert!(!header.is_problem());
        assert!(!header.is_work());

        let given = Line::problem(LineKind::Text, "Given: x=2");
        assert!(given.is_problem());
        assert!(!given.is_work());

        assert!(Line::new(LineKind::Math, "y=x+1").is_work());
    }

    #[test]
    fn test_line_serializes_to_persisted_shape() {
        let line = Line::problem(LineKind::Math, "x^2").with_id("abc");
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "abc", "content": "x^2", "mode": "math", "isProblem": true})
        );
    }

    #[test]
    fn test_check_outcome_wire_shape() {
        let outcome = CheckOutcome::Issue {
            issues: vec![StepIssue {
                step_index: 2,
                message: "sign error".to_string(),
            }],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "issue", "issues": [{"stepIndex": 2, "latex": "sign error"}]})
        );
        assert_eq!(
            serde_json::to_value(CheckOutcome::Ok).unwrap(),
            serde_json::json!({"status": "ok"})
        );
    }

    #[test]
    fn test_line_edit_parses_flattened_insert() {
        let edit: LineEdit = serde_json::from_str(
            r#"{"op": "insert_after", "index": 0, "mode": "math", "content": "a+b"}"#,
        )
        .unwrap();
        match edit {
            LineEdit::InsertAfter { index, line } => {
                assert_eq!(index, 0);
                assert_eq!(line.mode, LineKind::Math);
                assert_eq!(line.content, "a+b");
                assert!(!line.is_problem);
            }
            other => panic!("unexpected edit: {:?}", other),
        }
    }
}
