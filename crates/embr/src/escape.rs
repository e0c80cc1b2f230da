//! Field escaping for EMBR lines.
//!
//! Fields are separated by `|` and each entity occupies exactly one line, so field text must not
//! contain a raw separator or line break. Escaping rules:
//! - `\` → `\\`
//! - `|` → `\|`
//! - line feed → `\n`
//! - carriage return → `\r`

use crate::format::FIELD_SEPARATOR;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum EscapeError {
    #[error("line ends with an unfinished escape sequence")]
    DanglingBackslash,
    #[error("unknown escape sequence '\\{0}'")]
    UnknownEscape(char),
}

/// Escapes a single field value for output.
pub(crate) fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str(r"\\"),
            FIELD_SEPARATOR => out.push_str(r"\|"),
            '\n' => out.push_str(r"\n"),
            '\r' => out.push_str(r"\r"),
            other => out.push(other),
        }
    }
    out
}

/// Splits a line on unescaped separators and unescapes each field.
///
/// An empty line yields a single empty field.
pub(crate) fn split_fields(line: &str) -> Result<Vec<String>, EscapeError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('\\') => current.push('\\'),
                Some(FIELD_SEPARATOR) => current.push(FIELD_SEPARATOR),
                Some('n') => current.push('\n'),
                Some('r') => current.push('\r'),
                Some(other) => return Err(EscapeError::UnknownEscape(other)),
                None => return Err(EscapeError::DanglingBackslash),
            },
            FIELD_SEPARATOR => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(escape_field("Loss of teeth (disorder)"), "Loss of teeth (disorder)");
    }

    #[test]
    fn escapes_separator_backslash_and_line_breaks() {
        assert_eq!(escape_field("a|b"), r"a\|b");
        assert_eq!(escape_field(r"C:\notes"), r"C:\\notes");
        assert_eq!(escape_field("line1\nline2\r"), r"line1\nline2\r");
    }

    #[test]
    fn splits_on_unescaped_separators_only() {
        let fields = split_fields(r"CN-9|pipe \| inside|confirmed|1980").expect("split");
        assert_eq!(fields, vec!["CN-9", "pipe | inside", "confirmed", "1980"]);
    }

    #[test]
    fn keeps_empty_fields() {
        let fields = split_fields("a||c|").expect("split");
        assert_eq!(fields, vec!["a", "", "c", ""]);
        assert_eq!(split_fields("").expect("split"), vec![""]);
    }

    #[test]
    fn escape_then_split_recovers_awkward_text() {
        let awkward = "back\\slash | and\nnewline \\|";
        let line = format!("{}|tail", escape_field(awkward));
        let fields = split_fields(&line).expect("split");
        assert_eq!(fields, vec![awkward.to_string(), "tail".to_string()]);
    }

    #[test]
    fn rejects_bad_escapes() {
        assert_eq!(split_fields(r"abc\"), Err(EscapeError::DanglingBackslash));
        assert_eq!(split_fields(r"a\tb"), Err(EscapeError::UnknownEscape('t')));
    }
}
