//! Diff-hunk style snippets for result provenance.

use crate::types::Snippet;

pub const DEFAULT_SNIPPET_MAX_LINES: usize = 10;

/// Build a snippet for a chunk located at `chunk_char_offset` (in characters)
/// within `document_text`.
#[must_use]
pub fn extract_snippet(
    chunk_text: &str,
    chunk_char_offset: usize,
    document_text: &str,
    doc_path: &str,
    max_lines: usize,
) -> Snippet {
    let lines_before = document_text
        .chars()
        .take(chunk_char_offset)
        .filter(|c| *c == '\n')
        .count();
    snippet_at_line(chunk_text, lines_before + 1, doc_path, max_lines)
}

/// Snippet for a chunk whose position in the document is unknown.
#[must_use]
pub fn build_snippet(chunk_text: &str, doc_path: &str, max_lines: usize) -> Snippet {
    snippet_at_line(chunk_text, 1, doc_path, max_lines)
}

fn snippet_at_line(chunk_text: &str, start_line: usize, doc_path: &str, max_lines: usize) -> Snippet {
    let lines: Vec<&str> = chunk_text.split('\n').take(max_lines.max(1)).collect();
    let count = lines.len();
    Snippet {
        text: lines.join("\n"),
        start_line,
        end_line: start_line + count - 1,
        header: format!("@@ -{start_line},{count} +{start_line},{count} @@ {doc_path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_line_counts_newlines_before_offset() {
        let doc = "L1\nL2\nL3\nL4";
        let s = extract_snippet("L3\nL4", 6, doc, "notes/a.md", 10);
        assert_eq!(s.start_line, 3);
        assert_eq!(s.end_line, 4);
        assert_eq!(s.text, "L3\nL4");
        assert_eq!(s.header, "@@ -3,2 +3,2 @@ notes/a.md");
    }

    #[test]
    fn text_is_truncated_to_max_lines() {
        let chunk = (1..=15).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let s = build_snippet(&chunk, "a.md", 10);
        assert_eq!(s.text.lines().count(), 10);
        assert_eq!((s.start_line, s.end_line), (1, 10));
        assert_eq!(s.header, "@@ -1,10 +1,10 @@ a.md");
    }

    #[test]
    fn offset_counts_characters_not_bytes() {
        let doc = "é\nü\nbody";
        let s = extract_snippet("body", 4, doc, "x.md", 10);
        assert_eq!(s.start_line, 3);
    }
}
