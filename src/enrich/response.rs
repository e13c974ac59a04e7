//! Splitting a model response into a translated title and summary.

/// Separator the prompt asks the model to put between title and summary.
pub const DELIMITER: &str = "|||";

/// How to read a response that lacks [`DELIMITER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Whole response is the summary; the original title is kept.
    #[default]
    Strict,
    /// A multi-line response is read as title line + summary lines.
    Lenient,
}

/// Strip whitespace and stray markdown emphasis/heading markers.
fn trim_decorations(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '*' || c == '#').trim()
}

/// Parse a response into `(title, summary)`.
///
/// An empty title half falls back to `original_title`; an empty summary half
/// reuses the title half. Returns `None` when the response carries no usable
/// text, including a bare delimiter.
pub fn parse_response(
    response: &str,
    original_title: &str,
    mode: ParseMode,
) -> Option<(String, String)> {
    let whole = trim_decorations(response);
    if whole.is_empty() {
        return None;
    }

    if let Some((head, tail)) = response.split_once(DELIMITER) {
        return split_pair(trim_decorations(head), trim_decorations(tail), original_title);
    }

    if mode == ParseMode::Lenient {
        let mut lines = whole.lines();
        if let Some(first) = lines.next() {
            let rest: Vec<&str> = lines.map(str::trim).filter(|l| !l.is_empty()).collect();
            if !rest.is_empty() {
                let summary = rest.join(" ");
                return split_pair(trim_decorations(first), trim_decorations(&summary), original_title);
            }
        }
    }

    Some((original_title.to_string(), whole.to_string()))
}

fn split_pair(title: &str, summary: &str, original_title: &str) -> Option<(String, String)> {
    match (title.is_empty(), summary.is_empty()) {
        (true, true) => None,
        (true, false) => Some((original_title.to_string(), summary.to_string())),
        (false, true) => Some((title.to_string(), title.to_string())),
        (false, false) => Some((title.to_string(), summary.to_string())),
    }
}
