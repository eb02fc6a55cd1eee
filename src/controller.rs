//! Notebook controller: owns the document and its annotations.
//!
//! Checks and hints are split into a `begin_*` step that captures everything
//! the request needs and a `finish_*` step that applies the reply. The caller
//! awaits the reasoning service in between without holding the controller,
//! so the document can keep changing while a request is in flight. Replies
//! are applied to the line ids captured at `begin_*`; ids that have since
//! disappeared are skipped.

use crate::document::Document;
use crate::error::{NotebookError, Result};
use crate::latex;
use crate::models::{
    CheckOutcome, CheckRequest, CheckState, ExtractedContext, Feedback, FeedbackMap, HintMap,
    HintOutcome, HintRequest, Line, LineEdit, LineId, LineKind,
};
use crate::reasoning::ReasoningService;
use crate::samples;
use crate::sections;
use crate::snapshot::{parse_notebook, NotebookFile, SnapshotStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

/// Everything captured when a check starts.
#[derive(Debug, Clone)]
pub struct PendingCheck {
    pub target: LineId,
    pub target_is_work: bool,
    /// Ids of every line in the target's section at the time of the request.
    pub section_ids: Vec<LineId>,
    /// Work line ids in step order: `work_ids[n - 1]` is step `n`.
    pub work_ids: Vec<LineId>,
    pub request: CheckRequest,
}

#[derive(Debug, Clone)]
pub struct PendingHint {
    pub target: LineId,
    pub request: HintRequest,
}

pub struct NotebookController {
    document: Document,
    hints: HintMap,
    feedback: FeedbackMap,
    check_states: HashMap<LineId, CheckState>,
    store: Arc<dyn SnapshotStore>,
    demo_mode: bool,
}

impl NotebookController {
    /// A controller over a blank notebook. In demo mode nothing is persisted.
    pub fn new(store: Arc<dyn SnapshotStore>, demo_mode: bool) -> Self {
        Self {
            document: Document::new(),
            hints: HintMap::new(),
            feedback: FeedbackMap::new(),
            check_states: HashMap::new(),
            store,
            demo_mode,
        }
    }

    /// A controller over the last saved snapshot, or a blank notebook when
    /// there is none (or it no longer validates). Demo mode always starts
    /// blank.
    pub fn restore(store: Arc<dyn SnapshotStore>, demo_mode: bool) -> Self {
        let mut controller = Self::new(store, demo_mode);
        if demo_mode {
            return controller;
        }

        match controller.store.load() {
            Ok(Some(json)) => {
                let parsed = serde_json::from_str::<serde_json::Value>(&json)
                    .map_err(|e| NotebookError::ImportFormat(e.to_string()))
                    .and_then(|value| parse_notebook(&value));
                match parsed {
                    Ok(file) => {
                        controller.install(file);
                        tracing::info!(lines = controller.document.len(), "restored notebook snapshot");
                    }
                    Err(e) => tracing::warn!(error = %e, "discarding unreadable snapshot"),
                }
            }
            Ok(None) => tracing::info!("no saved notebook, starting blank"),
            Err(e) => tracing::warn!(error = %e, "could not load snapshot, starting blank"),
        }
        controller
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn hints(&self) -> &HintMap {
        &self.hints
    }

    pub fn feedback(&self) -> &FeedbackMap {
        &self.feedback
    }

    pub fn feedback_for(&self, id: &LineId) -> Option<&Feedback> {
        self.feedback.get(id)
    }

    pub fn hint_for(&self, id: &LineId) -> Option<&str> {
        self.hints.get(id).map(String::as_str)
    }

    pub fn check_state(&self, id: &LineId) -> CheckState {
        self.check_states.get(id).copied().unwrap_or_default()
    }

    pub fn is_demo(&self) -> bool {
        self.demo_mode
    }

    // ========================================================================
    // Line Store Mutations
    // ========================================================================

    pub fn insert_after(&mut self, index: usize, line: Line) -> Result<usize> {
        let inserted = self.document.insert_after(index, line)?;
        self.after_mutation();
        Ok(inserted)
    }

    pub fn delete_at(&mut self, index: usize) -> Result<()> {
        self.document.delete_at(index)?;
        self.after_mutation();
        Ok(())
    }

    pub fn update_content(&mut self, index: usize, content: impl Into<String>) -> Result<()> {
        self.document.update_content(index, content)?;
        self.after_mutation();
        Ok(())
    }

    pub fn update_kind(&mut self, index: usize, kind: LineKind) -> Result<()> {
        self.document.update_kind(index, kind)?;
        self.after_mutation();
        Ok(())
    }

    /// Flip the problem-context flag. Any verdict on the line is dropped,
    /// since it was given under the old classification.
    pub fn toggle_problem_context(&mut self, index: usize) -> Result<bool> {
        let flag = self.document.toggle_problem_context(index)?;
        if let Some(line) = self.document.get(index) {
            self.feedback.remove(&line.id);
        }
        self.after_mutation();
        Ok(flag)
    }

    pub fn replace_all(&mut self, lines: Vec<Line>) -> Result<()> {
        self.document.replace_all(lines)?;
        self.after_mutation();
        Ok(())
    }

    /// Apply one edit as sent by the browser.
    pub fn apply_edit(&mut self, edit: LineEdit) -> Result<()> {
        match edit {
            LineEdit::InsertAfter { index, line } => {
                self.insert_after(index, line.into_line())?;
            }
            LineEdit::Delete { index } => self.delete_at(index)?,
            LineEdit::UpdateContent { index, content } => self.update_content(index, content)?,
            LineEdit::UpdateKind { index, mode } => self.update_kind(index, mode)?,
            LineEdit::ToggleProblemContext { index } => {
                self.toggle_problem_context(index)?;
            }
            LineEdit::ReplaceAll { lines } => {
                self.replace_all(lines.into_iter().map(|d| d.into_line()).collect())?
            }
        }
        Ok(())
    }

    /// Back to a single empty line with no annotations.
    pub fn reset(&mut self) {
        self.document = Document::new();
        self.hints.clear();
        self.feedback.clear();
        self.check_states.clear();
        self.persist();
    }

    /// Drop annotations whose line is gone, and feedback on given lines.
    fn prune(&mut self) {
        let doc = &self.document;
        self.feedback
            .retain(|id, _| doc.find(id).is_some_and(|l| !l.is_problem()));
        self.hints.retain(|id, _| doc.contains(id));
        self.check_states.retain(|id, _| doc.contains(id));
    }

    fn after_mutation(&mut self) {
        self.prune();
        self.persist();
    }

    fn persist(&self) {
        if self.demo_mode {
            return;
        }
        let result = serde_json::to_string(&self.export())
            .map_err(|e| NotebookError::Storage(e.to_string()))
            .and_then(|json| self.store.save(&json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist notebook snapshot");
        }
    }

    // ========================================================================
    // Import / Export
    // ========================================================================

    pub fn export(&self) -> NotebookFile {
        NotebookFile {
            lines: self.document.lines().to_vec(),
            hints: self.hints.clone(),
            feedback: self.feedback.clone(),
            saved_at: Some(Utc::now()),
        }
    }

    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.export())
            .map_err(|e| NotebookError::Storage(e.to_string()))
    }

    pub fn export_latex(&self) -> String {
        latex::render_document(&self.document, &self.feedback)
    }

    /// Replace the notebook with an imported file. A file that fails
    /// validation is rejected as a whole and the notebook is reset.
    pub fn import_value(&mut self, value: &serde_json::Value) -> Result<()> {
        match parse_notebook(value) {
            Ok(file) => {
                self.install(file);
                self.persist();
                tracing::info!(lines = self.document.len(), "imported notebook");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected notebook import, resetting");
                self.reset();
                Err(e)
            }
        }
    }

    pub fn import_json(&mut self, json: &str) -> Result<()> {
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(value) => self.import_value(&value),
            Err(e) => {
                self.reset();
                Err(NotebookError::ImportFormat(format!("not valid JSON: {}", e)))
            }
        }
    }

    /// Replace the notebook with a built-in sample.
    pub fn load_template(&mut self, name: &str) -> Result<()> {
        let lines = samples::sample(name).ok_or_else(|| {
            NotebookError::Validation(format!(
                "unknown template '{}' (available: {})",
                name,
                samples::SAMPLE_NAMES.join(", ")
            ))
        })?;
        self.document.replace_all(lines)?;
        self.hints.clear();
        self.feedback.clear();
        self.check_states.clear();
        self.persist();
        Ok(())
    }

    fn install(&mut self, file: NotebookFile) {
        // parse_notebook has already rejected duplicate ids.
        if self.document.replace_all(file.lines).is_err() {
            self.document = Document::new();
        }
        self.hints = file.hints;
        self.feedback = file.feedback;
        self.check_states.clear();
        self.prune();
    }

    // ========================================================================
    // Reasoning Checks
    // ========================================================================

    pub fn extract(&self, index: usize) -> Result<ExtractedContext> {
        sections::extract(&self.document, &self.hints, &self.feedback, index)
    }

    /// Capture the context for checking the line at `index` and mark it as
    /// checking.
    ///
    /// A line that is already checking may be checked again; whichever reply
    /// is applied last wins. A pending check that is dropped without being
    /// finished does not block later checks.
    pub fn begin_check(&mut self, index: usize) -> Result<PendingCheck> {
        let context = self.extract(index)?;
        let target = self.document.lines()[index].clone();

        let bounds = sections::bounds_containing(self.document.lines(), index);
        let section_ids: Vec<LineId> = self.document.lines()[bounds]
            .iter()
            .map(|l| l.id.clone())
            .collect();
        let work_ids: Vec<LineId> = context.work_lines.iter().map(|w| w.line_id.clone()).collect();

        self.check_states.insert(target.id.clone(), CheckState::Checking);
        tracing::debug!(line = %target.id, steps = context.work_lines.len(), "check started");

        Ok(PendingCheck {
            target_is_work: target.is_work(),
            target: target.id,
            section_ids,
            work_ids,
            request: CheckRequest {
                problem_lines: context.problem_lines,
                user_lines: context.work_lines,
                hints: context.hints,
            },
        })
    }

    /// Apply a check reply. On failure the line goes back to idle and the
    /// error is returned; nothing else changes.
    pub fn finish_check(
        &mut self,
        pending: PendingCheck,
        result: Result<CheckOutcome>,
    ) -> Result<CheckState> {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(line = %pending.target, error = %e, "check failed");
                self.check_states.remove(&pending.target);
                return Err(e);
            }
        };

        for id in &pending.section_ids {
            self.feedback.remove(id);
        }

        let state = match outcome {
            CheckOutcome::Ok => {
                let verified = if pending.target_is_work {
                    Some(&pending.target)
                } else {
                    pending.work_ids.last()
                };
                if let Some(id) = verified {
                    self.write_feedback(id, Feedback::ok());
                }
                CheckState::SettledOk
            }
            CheckOutcome::Issue { issues } => {
                for issue in issues {
                    let step = issue
                        .step_index
                        .checked_sub(1)
                        .and_then(|i| pending.work_ids.get(i));
                    match step {
                        Some(id) => self.write_feedback(id, Feedback::issue(issue.message)),
                        None => tracing::debug!(
                            step = issue.step_index,
                            steps = pending.work_ids.len(),
                            "ignoring issue for unknown step"
                        ),
                    }
                }
                CheckState::SettledIssue
            }
        };

        if self.document.contains(&pending.target) {
            self.check_states.insert(pending.target.clone(), state);
        }
        self.persist();
        Ok(state)
    }

    /// Attach feedback if the line still exists and is still a work line.
    fn write_feedback(&mut self, id: &LineId, feedback: Feedback) {
        match self.document.find(id) {
            Some(line) if !line.is_problem() => {
                self.feedback.insert(id.clone(), feedback);
            }
            _ => tracing::debug!(line = %id, "dropping feedback for missing line"),
        }
    }

    pub fn begin_hint(&self, index: usize) -> Result<PendingHint> {
        let context = self.extract(index)?;
        let target = self.document.lines()[index].id.clone();
        Ok(PendingHint {
            target,
            request: HintRequest {
                problem_lines: context.problem_lines,
                user_lines: context.work_lines,
                feedback: context.feedback,
            },
        })
    }

    pub fn finish_hint(
        &mut self,
        pending: PendingHint,
        result: Result<HintOutcome>,
    ) -> Result<Option<String>> {
        let hint = result?;
        if !self.document.contains(&pending.target) {
            tracing::debug!(line = %pending.target, "dropping hint for missing line");
            return Ok(None);
        }
        self.hints.insert(pending.target, hint.text.clone());
        self.persist();
        Ok(Some(hint.text))
    }

    /// Check the line at `index` end to end.
    pub async fn check_line(
        &mut self,
        index: usize,
        service: &dyn ReasoningService,
    ) -> Result<CheckState> {
        let pending = self.begin_check(index)?;
        let result = service.check_reasoning(&pending.request).await;
        self.finish_check(pending, result)
    }

    /// Fetch and attach a hint for the line at `index`.
    pub async fn hint_line(
        &mut self,
        index: usize,
        service: &dyn ReasoningService,
    ) -> Result<Option<String>> {
        let pending = self.begin_hint(index)?;
        let result = service.get_hint(&pending.request).await;
        self.finish_hint(pending, result)
    }
}

impl std::fmt::Debug for NotebookController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookController")
            .field("lines", &self.document.len())
            .field("hints", &self.hints.len())
            .field("feedback", &self.feedback.len())
            .field("demo_mode", &self.demo_mode)
            .finish()
    }
}
