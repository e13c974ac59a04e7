use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Ellipsis appended when text is cut
const ELLIPSIS: &str = "...";
/// Display width of the ellipsis (3 columns for ASCII "...")
const ELLIPSIS_WIDTH: usize = 3;

static TAG_PATTERN: OnceLock<Regex> = OnceLock::new();

fn tag_pattern() -> &'static Regex {
    // (?s): feed descriptions routinely split tags across lines
    TAG_PATTERN.get_or_init(|| Regex::new(r"(?s)<.*?>").expect("tag pattern is a valid regex"))
}

/// Converts an HTML-bearing feed description into plain text.
///
/// Entities are decoded before tags are stripped, so escaped markup
/// (`&lt;p&gt;`) is removed as well. Non-breaking spaces, whether left as a
/// literal `&nbsp;` by double escaping or decoded to U+00A0, become plain
/// spaces.
///
/// ```
/// use robonews::util::clean_html;
///
/// assert_eq!(clean_html("<p>Robots&nbsp;&amp; AI</p>"), "Robots & AI");
/// ```
pub fn clean_html(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let unescaped = html_escape::decode_html_entities(raw);
    let stripped = tag_pattern().replace_all(&unescaped, "");
    let spaced = stripped.replace("&nbsp;", " ").replace('\u{a0}', " ");

    strip_control_chars(&spaced).trim().to_string()
}

/// Calculates the display width of a string in terminal columns.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Cuts `s` to at most `max_width` display columns, appending "..." when
/// anything was removed.
///
/// Width rather than char count keeps Korean and Latin fallback summaries
/// visually comparable in the rendered page. Returns `Cow::Borrowed` when the
/// string already fits.
///
/// ```
/// use robonews::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    // Too narrow for char + ellipsis: keep what fits, no marker
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Owned(take_width(s, max_width).to_string());
    }

    let kept = take_width(s, max_width - ELLIPSIS_WIDTH);
    Cow::Owned(format!("{}{}", kept.trim_end(), ELLIPSIS))
}

/// Longest prefix of `s` whose display width does not exceed `width`.
fn take_width(s: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > width {
            return &s[..idx];
        }
        used += w;
    }
    s
}

/// Strips terminal control characters and ANSI escape sequences.
///
/// Feed text ends up in JSON that a renderer pastes into HTML, and in log
/// lines; neither should carry escape sequences. Tab, newline and carriage
/// return are preserved.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_control = |c: char| {
        c == '\u{1b}' || c == '\u{7f}' || (c < ' ' && c != '\t' && c != '\n' && c != '\r')
    };

    if !s.chars().any(is_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            if !is_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            // CSI: ESC [ params... final byte in 0x40..=0x7e
            Some('[') => {
                chars.next();
                for n in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&n) {
                        break;
                    }
                }
            }
            // OSC: ESC ] ... terminated by BEL or ESC \
            Some(']') => {
                chars.next();
                while let Some(n) = chars.next() {
                    if n == '\u{07}' {
                        break;
                    }
                    if n == '\u{1b}' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}
