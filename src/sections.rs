//! Sections and context extraction.
//!
//! A section is the run of lines between two break lines (or the document
//! edges). Reasoning is always checked within one section, and only over the
//! lines written so far: everything after the target line is left out.

use crate::document::Document;
use crate::error::{NotebookError, Result};
use crate::models::{ExtractedContext, FeedbackMap, HintMap, Line, ProblemLine, WorkLine};
use std::ops::Range;

/// Half-open range of the section containing `index`.
///
/// A break line belongs to no section, so asking for one yields the empty
/// range `index..index`. Indices past the end yield `len..len`.
pub fn bounds_containing(lines: &[Line], index: usize) -> Range<usize> {
    if index >= lines.len() {
        return lines.len()..lines.len();
    }
    if lines[index].is_break() {
        return index..index;
    }

    let start = lines[..index]
        .iter()
        .rposition(Line::is_break)
        .map(|b| b + 1)
        .unwrap_or(0);
    let end = lines[index + 1..]
        .iter()
        .position(Line::is_break)
        .map(|b| index + 1 + b)
        .unwrap_or(lines.len());

    start..end
}

/// Every section of the document in order, including empty ones between
/// adjacent breaks.
pub fn sections(lines: &[Line]) -> Vec<Range<usize>> {
    let mut result = Vec::new();
    let mut start = 0;
    for (i, line) in lines.iter().enumerate() {
        if line.is_break() {
            result.push(start..i);
            start = i + 1;
        }
    }
    result.push(start..lines.len());
    result
}

/// Collect the problem and work lines of the section containing `up_to`,
/// stopping at `up_to` itself.
pub fn extract(
    doc: &Document,
    hints: &HintMap,
    feedback: &FeedbackMap,
    up_to: usize,
) -> Result<ExtractedContext> {
    let lines = doc.lines();
    let target = lines.get(up_to).ok_or_else(|| {
        NotebookError::Validation(format!(
            "line index {} out of range (document has {} lines)",
            up_to,
            lines.len()
        ))
    })?;
    if target.is_break() {
        return Err(NotebookError::Validation(
            "cannot extract context for a section break".to_string(),
        ));
    }

    let bounds = bounds_containing(lines, up_to);
    let slice = &lines[bounds.start..=up_to];

    let mut context = ExtractedContext::default();
    for line in slice {
        if line.is_problem() {
            context.problem_lines.push(ProblemLine {
                mode: line.kind,
                content: line.content.clone(),
            });
        } else if line.is_work() {
            context.work_lines.push(WorkLine {
                mode: line.kind,
                content: line.content.clone(),
                line_id: line.id.clone(),
            });
        }

        if let Some(hint) = hints.get(&line.id) {
            context.hints.insert(line.id.clone(), hint.clone());
        }
        if let Some(verdict) = feedback.get(&line.id) {
            context.feedback.insert(line.id.clone(), verdict.clone());
        }
    }

    Ok(context)
}
