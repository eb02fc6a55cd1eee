//! Export a notebook as a standalone LaTeX document.

use crate::document::Document;
use crate::models::{FeedbackMap, FeedbackStatus, LineKind};
use crate::sections::sections;

/// Escape the characters LaTeX treats specially in running text.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// True when every unescaped `{` has a matching `}`.
fn braces_balanced(s: &str) -> bool {
    let mut depth = 0usize;
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

/// Issue messages are LaTeX already; ones that would break the document are
/// kept as plain text.
fn margin_note(message: &str) -> String {
    if braces_balanced(message) {
        message.to_string()
    } else {
        escape_text(message)
    }
}

/// Render the document, one LaTeX section block per notebook section.
/// Issue verdicts are included as margin notes.
pub fn render_document(doc: &Document, feedback: &FeedbackMap) -> String {
    let mut out = String::from(
        "\\documentclass{article}\n\\usepackage{amsmath,amssymb}\n\\usepackage{graphicx}\n\\begin{document}\n",
    );

    let lines = doc.lines();
    let mut first = true;
    for range in sections(lines) {
        let section = &lines[range];
        if section.iter().all(|l| l.content.trim().is_empty()) {
            continue;
        }
        if !first {
            out.push_str("\n\\bigskip\\hrule\\bigskip\n");
        }
        first = false;

        for line in section {
            let content = line.content.trim();
            if content.is_empty() {
                continue;
            }
            match line.kind {
                LineKind::Header => {
                    out.push_str(&format!("\n\\section*{{{}}}\n", escape_text(content)))
                }
                LineKind::Text => out.push_str(&format!("{}\n\n", escape_text(content))),
                LineKind::Math => out.push_str(&format!("\\[ {} \\]\n", content)),
                LineKind::Image => out.push_str("\\fbox{[image]}\n\n"),
                LineKind::Break => {}
            }
            if let Some(verdict) = feedback.get(&line.id) {
                if verdict.status == FeedbackStatus::Issue {
                    out.push_str(&format!(
                        "\\marginpar{{\\small {}}}\n",
                        margin_note(verdict.message.as_deref().unwrap_or("check this step"))
                    ));
                }
            }
        }
    }

    out.push_str("\\end{document}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feedback, Line};

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("50% of $5 & x_1"), "50\\% of \\$5 \\& x\\_1");
    }

    #[test]
    fn test_render_sections_and_verdicts() {
        let doc = Document::from_lines(vec![
            Line::new(LineKind::Header, "Part A"),
            Line::new(LineKind::Math, "x = 1"),
            Line::new(LineKind::Break, ""),
            Line::new(LineKind::Text, "second part"),
        ])
        .unwrap();
        let mut feedback = FeedbackMap::new();
        feedback.insert(doc.get(1).unwrap().id.clone(), Feedback::issue("x = 2"));

        let tex = render_document(&doc, &feedback);
        assert!(tex.starts_with("\\documentclass{article}"));
        assert!(tex.contains("\\section*{Part A}"));
        assert!(tex.contains("\\[ x = 1 \\]"));
        assert!(tex.contains("\\marginpar{\\small x = 2}"));
        assert_eq!(tex.matches("\\hrule").count(), 1);
        assert!(tex.trim_end().ends_with("\\end{document}"));
    }

    #[test]
    fn test_unbalanced_issue_message_is_escaped() {
        let doc = Document::from_lines(vec![
            Line::new(LineKind::Math, "x = 1"),
            Line::new(LineKind::Math, "x = 2"),
        ])
        .unwrap();
        let mut feedback = FeedbackMap::new();
        feedback.insert(doc.get(0).unwrap().id.clone(), Feedback::issue("use $\\frac{1}{2}$"));
        feedback.insert(doc.get(1).unwrap().id.clone(), Feedback::issue("stray } here"));

        let tex = render_document(&doc, &feedback);
        assert!(tex.contains("\\marginpar{\\small use $\\frac{1}{2}$}"));
        assert!(tex.contains("\\marginpar{\\small stray \\} here}"));
    }

    #[test]
    fn test_braces_balanced() {
        assert!(braces_balanced("\\frac{a}{b}"));
        assert!(braces_balanced("\\{ set \\}"));
        assert!(!braces_balanced("a } b {"));
        assert!(!braces_balanced("{open"));
    }

    #[test]
    fn test_blank_document_renders_empty_body() {
        let tex = render_document(&Document::new(), &FeedbackMap::new());
        assert!(!tex.contains("\\hrule"));
        assert!(tex.contains("\\begin{document}\n\\end{document}"));
    }
}
