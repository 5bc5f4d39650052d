//! Small helpers shared by the domains and the interpreter.

mod graph;

pub(crate) use graph::{reverse_postorder, Successors};

/// Indents every line but the first by `width` spaces.
///
/// Used by the multi-line `Display` implementations so nested values line up under their
/// parent's first line.
pub(crate) fn indent_except_first_line(text: &str, width: usize) -> String {
    let padding = " ".repeat(width);
    let mut lines = text.lines();
    let mut result = String::with_capacity(text.len());
    if let Some(first) = lines.next() {
        result.push_str(first);
    }
    for line in lines {
        result.push('\n');
        result.push_str(&padding);
        result.push_str(line);
    }
    result
}
