//! Built-in sample notebooks.
//!
//! Samples are templates: every load produces fresh line ids.

use crate::models::{Line, LineKind};

pub const SAMPLE_NAMES: &[&str] = &["linear-equation", "derivative", "two-problems"];

/// Lines of the named sample, or `None` for an unknown name.
pub fn sample(name: &str) -> Option<Vec<Line>> {
    let lines = match name {
        "linear-equation" => vec![
            Line::new(LineKind::Header, "Solving a linear equation"),
            Line::problem(LineKind::Text, "Solve for x:"),
            Line::problem(LineKind::Math, "3x + 5 = 20"),
            Line::new(LineKind::Math, "3x = 15"),
            Line::new(LineKind::Math, "x = 5"),
        ],
        "derivative" => vec![
            Line::new(LineKind::Header, "Product rule"),
            Line::problem(LineKind::Text, "Differentiate with respect to x:"),
            Line::problem(LineKind::Math, "f(x) = x^2 \\sin x"),
            Line::new(LineKind::Math, "f'(x) = 2x \\sin x + x^2 \\cos x"),
        ],
        "two-problems" => vec![
            Line::new(LineKind::Header, "Warm-up"),
            Line::problem(LineKind::Math, "x + 2 = 7"),
            Line::new(LineKind::Math, "x = 5"),
            Line::new(LineKind::Break, ""),
            Line::new(LineKind::Header, "Quadratic"),
            Line::problem(LineKind::Math, "x^2 - 5x + 6 = 0"),
            Line::new(LineKind::Math, "(x-2)(x-3) = 0"),
            Line::new(LineKind::Text, "so x = 2 or x = 3"),
        ],
        _ => return None,
    };
    Some(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_sample_exists() {
        for name in SAMPLE_NAMES {
            let lines = sample(name).unwrap();
            assert!(!lines.is_empty());
            assert!(lines.iter().any(|l| l.is_problem()));
            assert!(lines.iter().any(|l| l.is_work()));
        }
        assert!(sample("nope").is_none());
    }

    #[test]
    fn test_samples_get_fresh_ids() {
        let first = sample("derivative").unwrap();
        let second = sample("derivative").unwrap();
        assert!(first.iter().zip(&second).all(|(a, b)| a.id != b.id));
    }
}
