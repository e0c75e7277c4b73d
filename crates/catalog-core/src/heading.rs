//! Split raw chunk text into heading and body columns for lexical indexing.

const FRONTMATTER_FENCE: &str = "---";

/// Returns `(heading_text, body_text)`.
///
/// The heading side holds the frontmatter `title:` (if any) followed by every
/// markdown heading line with its `#` marker removed, in document order. The
/// body side holds all other lines after the frontmatter block.
#[must_use]
pub fn extract_heading_body(text: &str) -> (String, String) {
    let (title, remaining) = split_frontmatter_title(text);

    let mut headings: Vec<&str> = Vec::new();
    if let Some(title) = title {
        headings.push(title);
    }
    let mut body: Vec<&str> = Vec::new();
    for line in remaining.lines() {
        match heading_content(line) {
            Some(content) => headings.push(content),
            None => body.push(line),
        }
    }

    let first = body.iter().position(|l| !l.trim().is_empty());
    let last = body.iter().rposition(|l| !l.trim().is_empty());
    let body_text = match (first, last) {
        (Some(first), Some(last)) => body[first..=last].join("\n"),
        _ => String::new(),
    };
    (headings.join("\n"), body_text)
}

/// `Some(content)` for `#{1,6}` + whitespace + non-empty content.
fn heading_content(line: &str) -> Option<&str> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }
    let content = rest.trim();
    if content.is_empty() { None } else { Some(content) }
}

/// Strip a leading `---` fenced frontmatter block, returning its title.
fn split_frontmatter_title(text: &str) -> (Option<&str>, &str) {
    let Some(first_line_end) = text.find('\n') else { return (None, text) };
    if text[..first_line_end].trim_end() != FRONTMATTER_FENCE {
        return (None, text);
    }

    let mut offset = first_line_end + 1;
    let mut title = None;
    while offset <= text.len() {
        let line_end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);
        let line = &text[offset..line_end];
        if line.trim_end() == FRONTMATTER_FENCE {
            let body_start = (line_end + 1).min(text.len());
            return (title, &text[body_start..]);
        }
        if title.is_none() {
            if let Some(value) = line.strip_prefix("title:") {
                let value = value.trim();
                if !value.is_empty() {
                    title = Some(value);
                }
            }
        }
        if line_end == text.len() {
            break;
        }
        offset = line_end + 1;
    }
    // Unterminated block: not frontmatter.
    (None, text)
}
