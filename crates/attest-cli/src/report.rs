//! Rendering check errors as annotated source snippets.

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};
use attest_checker::Error;

/// Render one error against the source it points into.
pub fn render(err: &Error, source: &str, colored: bool) -> String {
    let renderer = if colored {
        Renderer::styled()
    } else {
        Renderer::plain()
    };
    let message = err.kind.to_string();
    let range = adjust_range(err.span.clone(), source.len());
    let snippet = Snippet::source(source)
        .line_start(1)
        .path(&err.file)
        .annotation(AnnotationKind::Primary.span(range).label(&message));
    let report: Vec<Group> = vec![Level::ERROR.primary_title(&message).element(snippet)];
    format!("{}\n", renderer.render(&report))
}

/// Widen empty spans (end of file, say) so the caret has a character to
/// point at.
fn adjust_range(range: std::ops::Range<usize>, limit: usize) -> std::ops::Range<usize> {
    if range.start == range.end {
        let start = range.start.min(limit.saturating_sub(1));
        return start..(start + 1).min(limit);
    }
    range.start.min(limit)..range.end.min(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_checker::{CheckConfig, check_source};

    #[test]
    fn a_scope_error_renders_with_its_source_line() {
        let src = "(declare bool type)\n(check foo)\n";
        let err = check_source(src, "proof.plf", CheckConfig::default()).unwrap_err();
        let out = render(&err, src, false);
        assert!(out.contains("scope error"), "{out}");
        assert!(out.contains("proof.plf"), "{out}");
        assert!(out.contains("(check foo)"), "{out}");
    }

    #[test]
    fn empty_spans_still_point_somewhere() {
        assert_eq!(adjust_range(5..5, 10), 5..6);
        assert_eq!(adjust_range(10..10, 10), 9..10);
        assert_eq!(adjust_range(0..0, 0), 0..0);
    }
}
