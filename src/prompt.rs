//! Prompt assembly for the reasoning service.
//!
//! The transcript numbers work lines from 1 in the order they were extracted.
//! Those numbers come back as `stepIndex` values in check replies, so the
//! numbering here and the lookup in the controller must stay in lockstep.

use crate::models::{FeedbackMap, FeedbackStatus, HintMap, LineKind, ProblemLine, WorkLine};
use regex::Regex;
use std::sync::OnceLock;

pub const IMAGE_END_MARKER: &str = "[End of image]";

const CHECK_INSTRUCTIONS: &str = "You are a careful mathematics tutor reviewing a student's written work. \
The problem statement is listed under \"Given\". The student's work is listed as numbered steps. \
Decide whether each step follows correctly from the given information and the previous steps. \
Judge only the steps shown; do not penalize the student for not having finished. \
Hints the student has already seen are shown under the step they belong to.\n\n\
Reply with ONLY a JSON object and no other text:\n\
- if every step is correct: {\"status\": \"ok\"}\n\
- otherwise: {\"status\": \"issue\", \"issues\": [{\"stepIndex\": <step number>, \"latex\": \"<short explanation, LaTeX allowed>\"}]}\n\
Use the step numbers exactly as shown. Do not reveal the final answer.";

const HINT_INSTRUCTIONS: &str = "You are a patient mathematics tutor. \
The problem statement is listed under \"Given\" and the student's work so far as numbered steps. \
Write one short hint that helps the student take the next step without giving away the answer. \
If a step was flagged as wrong, the hint should steer the student toward fixing it. \
LaTeX is allowed inside $...$.\n\n\
Reply with ONLY a JSON object and no other text: {\"hint\": \"<your hint>\"}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Check,
    Hint,
}

impl PromptMode {
    pub fn instructions(self) -> &'static str {
        match self {
            PromptMode::Check => CHECK_INSTRUCTIONS,
            PromptMode::Hint => HINT_INSTRUCTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptBlock {
    Text(String),
    Image(ImageSource),
}

/// System instructions plus the transcript, in content-block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningPrompt {
    pub mode: PromptMode,
    pub system: String,
    pub blocks: Vec<PromptBlock>,
}

impl ReasoningPrompt {
    /// Text-only rendering of the transcript, with images shown as `<image>`.
    pub fn transcript_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| match b {
                PromptBlock::Text(t) => t.as_str(),
                PromptBlock::Image(_) => "<image>\n",
            })
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, PromptBlock::Image(_)))
            .count()
    }
}

fn data_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^data:(image/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=\s]+)$").ok())
        .as_ref()
}

/// Parse an image line's content: a `data:` URL or a remote http(s) URL.
pub fn parse_image_source(content: &str) -> Option<ImageSource> {
    let content = content.trim();
    let data_url = data_url_pattern()?;

    if let Some(caps) = data_url.captures(content) {
        let data: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
        if data.is_empty() {
            return None;
        }
        return Some(ImageSource::Base64 {
            media_type: caps[1].to_string(),
            data,
        });
    }

    if content.starts_with("https://") || content.starts_with("http://") {
        return Some(ImageSource::Url(content.to_string()));
    }

    None
}

// ============================================================================
// Transcript Writer
// ============================================================================

/// Accumulates text and flushes it into a block whenever an image interrupts.
#[derive(Default)]
struct Transcript {
    blocks: Vec<PromptBlock>,
    pending: String,
}

impl Transcript {
    fn line(&mut self, text: &str) {
        self.pending.push_str(text);
        self.pending.push('\n');
    }

    fn image(&mut self, label: &str, content: &str) {
        match parse_image_source(content) {
            Some(source) => {
                self.line(&format!("[Image: {}]", label));
                self.flush();
                self.blocks.push(PromptBlock::Image(source));
                self.line(IMAGE_END_MARKER);
            }
            None => self.line(&format!("[Image: {}] (image could not be attached)", label)),
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.blocks
                .push(PromptBlock::Text(std::mem::take(&mut self.pending)));
        }
    }

    fn finish(mut self) -> Vec<PromptBlock> {
        self.flush();
        self.blocks
    }
}

fn entry_label(mode: LineKind) -> &'static str {
    match mode {
        LineKind::Math => "math",
        LineKind::Image => "image",
        _ => "text",
    }
}

/// Build the prompt for a check or hint request.
pub fn build(
    problem_lines: &[ProblemLine],
    work_lines: &[WorkLine],
    hints: &HintMap,
    feedback: &FeedbackMap,
    mode: PromptMode,
) -> ReasoningPrompt {
    let mut transcript = Transcript::default();

    transcript.line("Given:");
    if problem_lines.is_empty() {
        transcript.line("(no problem statement marked)");
    }
    for (i, given) in problem_lines.iter().enumerate() {
        if given.mode == LineKind::Image {
            transcript.image(&format!("Given {}", i + 1), &given.content);
        } else {
            transcript.line(&format!("- [{}] {}", entry_label(given.mode), given.content));
        }
    }

    transcript.line("");
    transcript.line("Student work:");
    if work_lines.is_empty() {
        transcript.line("(no steps written yet)");
    }
    for (i, step) in work_lines.iter().enumerate() {
        let number = i + 1;
        if step.mode == LineKind::Image {
            transcript.image(&format!("Step {}", number), &step.content);
        } else {
            transcript.line(&format!(
                "Step {} [{}]: {}",
                number,
                entry_label(step.mode),
                step.content
            ));
        }

        if let Some(hint) = hints.get(&step.line_id) {
            transcript.line(&format!("  Hint already shown for step {}: {}", number, hint));
        }
        if mode == PromptMode::Hint {
            if let Some(verdict) = feedback.get(&step.line_id) {
                if verdict.status == FeedbackStatus::Issue {
                    transcript.line(&format!(
                        "  Step {} was flagged: {}",
                        number,
                        verdict.message.as_deref().unwrap_or("(no details)")
                    ));
                }
            }
        }
    }

    ReasoningPrompt {
        mode,
        system: mode.instructions().to_string(),
        blocks: transcript.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feedback, LineId};

    fn work(id: &str, mode: LineKind, content: &str) -> WorkLine {
        WorkLine {
            mode,
            content: content.to_string(),
            line_id: LineId::from(id),
        }
    }

    fn given(content: &str) -> ProblemLine {
        ProblemLine {
            mode: LineKind::Text,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_steps_are_numbered_from_one_in_order() {
        let steps = vec![
            work("a", LineKind::Math, "y=x+1"),
            work("b", LineKind::Math, "y=3"),
            work("c", LineKind::Text, "so y is three"),
        ];
        let prompt = build(
            &[given("Given: x=2")],
            &steps,
            &HintMap::new(),
            &FeedbackMap::new(),
            PromptMode::Check,
        );
        let text = prompt.transcript_text();

        assert!(text.contains("- [text] Given: x=2"));
        let one = text.find("Step 1 [math]: y=x+1").unwrap();
        let two = text.find("Step 2 [math]: y=3").unwrap();
        let three = text.find("Step 3 [text]: so y is three").unwrap();
        assert!(one < two && two < three);
        assert_eq!(prompt.system, CHECK_INSTRUCTIONS);
    }

    #[test]
    fn test_hint_follows_its_step() {
        let steps = vec![work("a", LineKind::Math, "2x=4"), work("b", LineKind::Math, "x=2")];
        let mut hints = HintMap::new();
        hints.insert(LineId::from("a"), "divide both sides".to_string());

        let text = build(&[], &steps, &hints, &FeedbackMap::new(), PromptMode::Check)
            .transcript_text();
        let step_one = text.find("Step 1").unwrap();
        let hint = text.find("Hint already shown for step 1: divide both sides").unwrap();
        let step_two = text.find("Step 2").unwrap();
        assert!(step_one < hint && hint < step_two);
    }

    #[test]
    fn test_flagged_steps_only_mentioned_in_hint_mode() {
        let steps = vec![work("a", LineKind::Math, "x=3")];
        let mut feedback = FeedbackMap::new();
        feedback.insert(LineId::from("a"), Feedback::issue("should be 2"));

        let hint_text = build(&[], &steps, &HintMap::new(), &feedback, PromptMode::Hint)
            .transcript_text();
        assert!(hint_text.contains("Step 1 was flagged: should be 2"));

        let check_text = build(&[], &steps, &HintMap::new(), &feedback, PromptMode::Check)
            .transcript_text();
        assert!(!check_text.contains("flagged"));
    }

    #[test]
    fn test_image_keeps_transcript_position() {
        let steps = vec![
            work("a", LineKind::Math, "a=1"),
            work("b", LineKind::Image, "data:image/png;base64,iVBORw0KGgo="),
            work("c", LineKind::Math, "c=3"),
        ];
        let prompt = build(&[], &steps, &HintMap::new(), &FeedbackMap::new(), PromptMode::Check);

        assert_eq!(prompt.image_count(), 1);
        let image_pos = prompt
            .blocks
            .iter()
            .position(|b| matches!(b, PromptBlock::Image(_)))
            .unwrap();
        match (&prompt.blocks[image_pos - 1], &prompt.blocks[image_pos + 1]) {
            (PromptBlock::Text(before), PromptBlock::Text(after)) => {
                assert!(before.contains("Step 1 [math]: a=1"));
                assert!(before.trim_end().ends_with("[Image: Step 2]"));
                assert!(after.starts_with(IMAGE_END_MARKER));
                assert!(after.contains("Step 3 [math]: c=3"));
            }
            other => panic!("unexpected neighbours: {:?}", other),
        }
        assert_eq!(
            prompt.blocks[image_pos],
            PromptBlock::Image(ImageSource::Base64 {
                media_type: "image/png".to_string(),
                data: "iVBORw0KGgo=".to_string(),
            })
        );
    }

    #[test]
    fn test_unusable_image_becomes_text_marker() {
        let steps = vec![work("a", LineKind::Image, "not an image")];
        let prompt = build(&[], &steps, &HintMap::new(), &FeedbackMap::new(), PromptMode::Hint);
        assert_eq!(prompt.image_count(), 0);
        assert!(prompt
            .transcript_text()
            .contains("[Image: Step 1] (image could not be attached)"));
    }

    #[test]
    fn test_parse_image_source() {
        assert_eq!(
            parse_image_source("https://example.com/graph.png"),
            Some(ImageSource::Url("https://example.com/graph.png".to_string()))
        );
        assert_eq!(parse_image_source("data:image/png;base64,"), None);
        assert_eq!(parse_image_source("data:text/plain;base64,aGk="), None);
    }

    #[test]
    fn test_data_url_pattern_is_compiled_once() {
        let first = data_url_pattern().unwrap();
        let second = data_url_pattern().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(
            parse_image_source("data:image/png;base64,aGVs\nbG8="),
            Some(ImageSource::Base64 {
                media_type: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            })
        );
    }
}
