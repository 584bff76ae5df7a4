//! Quoted-field tokenizer for inbound account rows
//!
//! This is intentionally not an RFC 4180 parser. Quotes only group text
//! and are dropped from the output, and a doubled quote is consumed one
//! pair at a time: the escaped quote is kept and the quoted run ends.
//! Malformed quoting never fails, it just degrades into literal text.

pub const DELIMITER: char = ',';
pub const QUOTE: char = '"';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Unquoted,
    Quoted,
}

/// Characters matched by a Unicode line-break sequence
pub fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\u{000B}' | '\u{000C}' | '\r' | '\u{0085}' | '\u{2028}' | '\u{2029}'
    )
}

/// Remove line breaks and any leading or trailing run of delimiters.
///
/// `",,,text,,,"` becomes `"text"`. Idempotent.
pub fn scrub(line: &str) -> String {
    let without_breaks: String = line.chars().filter(|c| !is_line_break(*c)).collect();
    without_breaks.trim_matches(DELIMITER).to_string()
}

/// Split one row into positional fields. Always returns at least one field.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut state = QuoteState::Unquoted;
    let mut chars_since_quote_open = 0usize;

    for c in line.chars() {
        match (c, state) {
            (QUOTE, QuoteState::Unquoted) => {
                state = QuoteState::Quoted;
                chars_since_quote_open = 0;
            }
            (QUOTE, QuoteState::Quoted) if chars_since_quote_open == 0 => {
                // `""` right after an opening quote
                field.push(QUOTE);
                chars_since_quote_open += 1;
                state = QuoteState::Unquoted;
            }
            (QUOTE, QuoteState::Quoted) => {
                state = QuoteState::Unquoted;
            }
            (DELIMITER, QuoteState::Unquoted) => {
                fields.push(std::mem::take(&mut field));
                chars_since_quote_open = 0;
            }
            (_, QuoteState::Quoted) => {
                field.push(c);
                chars_since_quote_open += 1;
            }
            (_, QuoteState::Unquoted) => field.push(c),
        }
    }

    fields.push(field);
    fields
}
