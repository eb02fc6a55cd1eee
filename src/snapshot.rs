//! Persisted notebook format and snapshot storage.
//!
//! The same JSON shape is used for file export/import and for the snapshot
//! written after every edit:
//!
//! ```json
//! {
//!   "lines": [{"id": "...", "content": "...", "mode": "math", "isProblem": false}],
//!   "hints": {"<lineId>": "..."},
//!   "feedback": {"<lineId>": {"status": "issue", "latex": "..."}}
//! }
//! ```

use crate::error::{NotebookError, Result};
use crate::models::{Feedback, FeedbackMap, FeedbackStatus, HintMap, Line, LineId, LineKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;

const SNAPSHOT_TREE: &str = "notebooks";
const CURRENT_KEY: &str = "current";

// ============================================================================
// Notebook File
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookFile {
    pub lines: Vec<Line>,
    pub hints: HintMap,
    pub feedback: FeedbackMap,
    /// Informational; ignored on import.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Parse and validate a notebook file.
///
/// Line errors reject the whole file. Hint and feedback entries that are
/// malformed or point at unknown lines are dropped, as is feedback on
/// problem-context lines.
pub fn parse_notebook(value: &Value) -> Result<NotebookFile> {
    let raw_lines = value
        .get("lines")
        .ok_or_else(|| NotebookError::ImportFormat("missing 'lines'".to_string()))?
        .as_array()
        .ok_or_else(|| NotebookError::ImportFormat("'lines' is not a list".to_string()))?;
    if raw_lines.is_empty() {
        return Err(NotebookError::ImportFormat("'lines' is empty".to_string()));
    }

    let mut lines = Vec::with_capacity(raw_lines.len());
    let mut seen = HashSet::new();
    for (i, raw) in raw_lines.iter().enumerate() {
        let line = parse_line(raw).map_err(|reason| {
            NotebookError::ImportFormat(format!("line {}: {}", i + 1, reason))
        })?;
        if !seen.insert(line.id.clone()) {
            return Err(NotebookError::ImportFormat(format!(
                "line {}: duplicate id {}",
                i + 1,
                line.id
            )));
        }
        lines.push(line);
    }

    let hints: HintMap = value
        .get("hints")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(id, text)| Some((LineId::from(id.as_str()), text.as_str()?.to_string())))
                .filter(|(id, _)| seen.contains(id))
                .collect()
        })
        .unwrap_or_default();

    let feedback: FeedbackMap = value
        .get("feedback")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(id, entry)| Some((LineId::from(id.as_str()), parse_feedback(entry)?)))
                .filter(|(id, _)| lines.iter().any(|l| &l.id == id && !l.is_problem()))
                .collect()
        })
        .unwrap_or_default();

    Ok(NotebookFile {
        lines,
        hints,
        feedback,
        saved_at: None,
    })
}

fn parse_line(raw: &Value) -> std::result::Result<Line, String> {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .ok_or("missing string 'id'")?;
    let content = raw
        .get("content")
        .and_then(Value::as_str)
        .ok_or("missing string 'content'")?;
    let mode = raw
        .get("mode")
        .and_then(Value::as_str)
        .ok_or("missing string 'mode'")?;
    let kind = LineKind::parse(mode).ok_or_else(|| format!("unknown mode '{}'", mode))?;
    let is_problem = raw
        .get("isProblem")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(Line {
        id: LineId::from(id),
        content: content.to_string(),
        kind,
        is_problem_context: is_problem,
    })
}

fn parse_feedback(entry: &Value) -> Option<Feedback> {
    let status = match entry.get("status")?.as_str()? {
        "ok" => FeedbackStatus::Ok,
        "issue" => FeedbackStatus::Issue,
        _ => return None,
    };
    let message = entry
        .get("latex")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(Feedback { status, message })
}

// ============================================================================
// Snapshot Stores
// ============================================================================

/// Where the controller writes a snapshot after each edit.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, json: &str) -> Result<()>;
}

/// Sled-backed store holding the single current notebook.
pub struct SledSnapshotStore {
    tree: sled::Tree,
}

impl SledSnapshotStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(SNAPSHOT_TREE)?,
        })
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn load(&self) -> Result<Option<String>> {
        match self.tree.get(CURRENT_KEY)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| NotebookError::Storage(format!("snapshot is not UTF-8: {}", e))),
            None => Ok(None),
        }
    }

    fn save(&self, json: &str) -> Result<()> {
        self.tree.insert(CURRENT_KEY, json.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }
}

/// In-process store, used in demo setups and tests.
#[derive(Default)]
pub struct MemorySnapshotStore {
    current: Mutex<Option<String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<String>> {
        let guard = self
            .current
            .lock()
            .map_err(|_| NotebookError::Storage("snapshot lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, json: &str) -> Result<()> {
        let mut guard = self
            .current
            .lock()
            .map_err(|_| NotebookError::Storage("snapshot lock poisoned".to_string()))?;
        *guard = Some(json.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_or_empty_lines_rejected() {
        for doc in [json!({}), json!({"lines": "nope"}), json!({"lines": []})] {
            assert!(matches!(
                parse_notebook(&doc),
                Err(NotebookError::ImportFormat(_))
            ));
        }
    }

    #[test]
    fn test_any_bad_line_rejects_whole_file() {
        let bad_lines = [
            json!({"content": "x", "mode": "math"}),
            json!({"id": 7, "content": "x", "mode": "math"}),
            json!({"id": "a", "mode": "math"}),
            json!({"id": "a", "content": "x", "mode": "code"}),
        ];
        for bad in bad_lines {
            let doc = json!({"lines": [
                {"id": "ok", "content": "fine", "mode": "text"},
                bad,
            ]});
            let err = parse_notebook(&doc).unwrap_err();
            assert!(err.to_string().contains("line 2"), "{}", err);
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let doc = json!({"lines": [
            {"id": "a", "content": "x", "mode": "math"},
            {"id": "a", "content": "y", "mode": "math"},
        ]});
        assert!(parse_notebook(&doc).is_err());
    }

    #[test]
    fn test_is_problem_defaults_to_false() {
        let doc = json!({"lines": [{"id": "a", "content": "x", "mode": "math"}]});
        let file = parse_notebook(&doc).unwrap();
        assert!(!file.lines[0].is_problem_context);
    }

    #[test]
    fn test_dangling_annotations_dropped() {
        let doc = json!({
            "lines": [
                {"id": "given", "content": "x=2", "mode": "math", "isProblem": true},
                {"id": "work", "content": "y=3", "mode": "math"},
            ],
            "hints": {"work": "add one", "ghost": "lost", "given": 5},
            "feedback": {
                "work": {"status": "issue", "latex": "check again"},
                "given": {"status": "ok"},
                "ghost": {"status": "ok"},
            }
        });
        let file = parse_notebook(&doc).unwrap();
        assert_eq!(file.hints.len(), 1);
        assert_eq!(file.hints[&LineId::from("work")], "add one");
        assert_eq!(file.feedback.len(), 1);
        assert_eq!(
            file.feedback[&LineId::from("work")],
            Feedback::issue("check again")
        );
    }

    #[test]
    fn test_unknown_feedback_status_dropped() {
        let doc = json!({
            "lines": [{"id": "w", "content": "y", "mode": "math"}],
            "feedback": {"w": {"status": "maybe"}}
        });
        assert!(parse_notebook(&doc).unwrap().feedback.is_empty());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySnapshotStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save("{\"lines\": []}").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("{\"lines\": []}"));
    }

    #[test]
    fn test_sled_store_round_trip() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledSnapshotStore::open(&db).unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.save("{}").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("{}"));
    }
}
