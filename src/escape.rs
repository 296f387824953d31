//! Escaping for text embedded in a JavaScript template literal.

/// Escape `text` so that it can sit between the backticks of a template
/// literal and evaluate back to exactly `text`.
///
/// Order matters: backslashes first, so the backslashes introduced by the
/// later steps are never doubled.
pub fn escape_template_literal(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
        // Raw CR and CRLF are normalized to LF inside template literals.
        .replace('\r', "\\r")
}

/// Render `text` as a tagged template literal, e.g. ``css`...` ``.
pub fn tagged_literal(tag: &str, text: &str) -> String {
    let escaped = escape_template_literal(text);
    let mut out = String::with_capacity(tag.len() + escaped.len() + 2);
    out.push_str(tag);
    out.push('`');
    out.push_str(&escaped);
    out.push('`');
    out
}
