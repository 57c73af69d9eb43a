//! Rendering captured exceptions to display strings.
//!
//! Two shapes are supported: syntax errors, rendered as the offending source line, a
//! caret under the error column and a `Type: msg` summary; and everything else,
//! rendered as `Type: str(value)`. Rendering never fails. Missing attributes become
//! empty strings, and any error the runtime raises while we introspect the value is
//! cleared before returning, leaving the pending-error slot exactly as it was found.

use crate::{
    pending::{self, ErrorTriple},
    runtime::ForeignRuntime,
};

/// Renders a triple, picking the syntax-error layout when the value is a syntax error.
#[must_use]
pub fn render<R: ForeignRuntime>(triple: &ErrorTriple<R>) -> String {
    pending::preserving::<R, _>(|| match triple.payload() {
        Some(payload) if payload.is_syntax_error() => syntax_error(triple),
        Some(_) => generic(triple),
        None => String::new(),
    })
}

/// Renders a triple using the syntax-error layout:
///
/// ```text
/// x = = 1
///     ^
/// SyntaxError: invalid syntax
/// ```
#[must_use]
pub fn render_syntax_error<R: ForeignRuntime>(triple: &ErrorTriple<R>) -> String {
    pending::preserving::<R, _>(|| syntax_error(triple))
}

/// Renders a triple as `Type: message`.
#[must_use]
pub fn render_generic<R: ForeignRuntime>(triple: &ErrorTriple<R>) -> String {
    pending::preserving::<R, _>(|| generic(triple))
}

fn syntax_error<R: ForeignRuntime>(triple: &ErrorTriple<R>) -> String {
    let Some(payload) = triple.payload() else {
        return String::new();
    };
    let text = payload.getattr(c"text").and_then(|text| text.text()).unwrap_or_default();
    let offset = payload
        .getattr(c"offset")
        .and_then(|offset| offset.as_index())
        .unwrap_or(0);
    let type_name = payload.type_name().unwrap_or_default();
    let msg = payload.getattr(c"msg").and_then(|msg| msg.text()).unwrap_or_default();

    let (line, offset) = error_line(&text, offset);
    let padding = caret_padding(offset).min(line.chars().count());
    format!("{line}\n{}^\n{type_name}: {msg}", " ".repeat(padding))
}

fn generic<R: ForeignRuntime>(triple: &ErrorTriple<R>) -> String {
    let Some(payload) = triple.payload() else {
        return String::new();
    };
    let type_name = payload.type_name().unwrap_or_default();
    let Some(message) = payload.str().and_then(|s| s.text()) else {
        return String::new();
    };
    summary(&type_name, &message)
}

/// `Type: message`, or just `Type` when the message is empty.
pub(crate) fn summary(type_name: &str, message: &str) -> String {
    if message.is_empty() {
        type_name.to_owned()
    } else {
        format!("{type_name}: {message}")
    }
}

/// Picks the line of `text` that the 1-based `offset` falls on and rebases the offset
/// onto it. The last line absorbs offsets past the end.
fn error_line(text: &str, mut offset: i64) -> (&str, i64) {
    let mut lines = text.split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
        let len = i64::try_from(line.chars().count()).unwrap_or(i64::MAX);
        if offset <= len || lines.peek().is_none() {
            return (line.trim_end_matches(['\n', '\r']), offset);
        }
        offset -= len;
    }
    ("", offset)
}

/// Converts a 1-based column to the number of spaces before the caret.
fn caret_padding(offset: i64) -> usize {
    usize::try_from(offset.saturating_sub(1)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_padding_is_offset_minus_one() {
        assert_eq!(caret_padding(5), 4);
        assert_eq!(caret_padding(1), 0);
    }

    #[test]
    fn caret_padding_clamps_non_positive_offsets() {
        assert_eq!(caret_padding(0), 0);
        assert_eq!(caret_padding(-1), 0);
        assert_eq!(caret_padding(i64::MIN), 0);
    }

    #[test]
    fn error_line_follows_offset_across_lines() {
        assert_eq!(error_line("x = = 1\n", 5), ("x = = 1", 5));
        assert_eq!(error_line("if x:\n  y = = 2\n", 13), ("  y = = 2", 7));
        assert_eq!(error_line("a\nb", 0), ("a", 0));
        assert_eq!(error_line("a\nb", 99), ("b", 97));
        assert_eq!(error_line("", 3), ("", 3));
    }

    #[test]
    fn summary_omits_separator_for_empty_message() {
        assert_eq!(summary("KeyboardInterrupt", ""), "KeyboardInterrupt");
        assert_eq!(summary("ValueError", "bad"), "ValueError: bad");
    }
}
