//! Comma-separated table encoding.
//!
//! ## Format
//!
//! ```text
//! name,qty,note\r\n
//! x,1,\r\n
//! "a, b",2,"say ""hi""\r\n
//! on two lines"\r\n
//! ```
//!
//! - The first row is the header; it lists the field names of the first record.
//! - Every later row is laid out against that header (see [`Record::project`]).
//! - A field is quoted when it contains a comma, a quote, CR or LF; quotes
//!   inside are doubled. Everything else is written bare.
//! - An empty table is an empty file: no header row.
//!
//! The decoder accepts `\n` and `\r\n` row endings and skips blank lines.
//! Short rows read as empty trailing fields; surplus values are ignored.

use crate::error::{CoreError, CoreResult};
use crate::record::Record;

const DELIMITER: char = ',';
const QUOTE: char = '"';
const ROW_END: &str = "\r\n";

/// Encodes records as a table. The header comes from the first record.
pub fn encode_table(records: &[Record]) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };

    let header: Vec<String> = first.field_names().map(str::to_string).collect();
    let mut out = String::new();
    write_row(&mut out, header.iter().map(String::as_str));
    for record in records {
        write_row(&mut out, record.project(&header).into_iter());
    }
    out
}

/// Decodes a table into records.
///
/// # Errors
///
/// Returns [`CoreError::Malformed`] if a quoted field is never closed.
pub fn decode_table(text: &str) -> CoreResult<Vec<Record>> {
    let mut rows = parse_rows(text)?.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };

    Ok(rows
        .map(|values| {
            header
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), values.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect())
}

/// Decodes raw file bytes, rejecting invalid UTF-8.
///
/// # Errors
///
/// Returns [`CoreError::Malformed`] for non-UTF-8 content or an unclosed quote.
pub fn decode_bytes(bytes: &[u8]) -> CoreResult<Vec<Record>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| CoreError::malformed(format!("table is not valid UTF-8: {e}")))?;
    decode_table(text)
}

fn write_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let fields: Vec<&str> = fields.collect();
    // A lone empty field would read back as a blank line.
    if let [only] = fields.as_slice() {
        if only.is_empty() {
            out.push_str("\"\"");
            out.push_str(ROW_END);
            return;
        }
    }
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        write_field(out, field);
    }
    out.push_str(ROW_END);
}

fn write_field(out: &mut String, field: &str) {
    let needs_quotes = field
        .chars()
        .any(|c| c == DELIMITER || c == QUOTE || c == '\r' || c == '\n');
    if !needs_quotes {
        out.push_str(field);
        return;
    }
    out.push(QUOTE);
    for c in field.chars() {
        if c == QUOTE {
            out.push(QUOTE);
        }
        out.push(c);
    }
    out.push(QUOTE);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    /// At the start of a field, nothing consumed yet.
    FieldStart,
    /// Inside an unquoted field.
    Bare,
    /// Inside a quoted field.
    Quoted,
    /// Just saw a quote while inside a quoted field.
    QuoteInQuoted,
}

struct RowBuilder {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    field: String,
    /// Whether the current row has any content, quoted empties included.
    touched: bool,
}

impl RowBuilder {
    fn end_field(&mut self) {
        self.row.push(std::mem::take(&mut self.field));
    }

    fn end_row(&mut self) {
        self.end_field();
        let row = std::mem::take(&mut self.row);
        if self.touched {
            self.rows.push(row);
        }
        self.touched = false;
    }
}

fn parse_rows(text: &str) -> CoreResult<Vec<Vec<String>>> {
    let mut b = RowBuilder {
        rows: Vec::new(),
        row: Vec::new(),
        field: String::new(),
        touched: false,
    };
    let mut state = State::FieldStart;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (state, c) {
            (State::Quoted, QUOTE) => state = State::QuoteInQuoted,
            (State::Quoted, c) => b.field.push(c),
            (State::QuoteInQuoted, QUOTE) => {
                b.field.push(QUOTE);
                state = State::Quoted;
            }
            (State::FieldStart, QUOTE) => {
                b.touched = true;
                state = State::Quoted;
            }
            (_, DELIMITER) => {
                b.touched = true;
                b.end_field();
                state = State::FieldStart;
            }
            (_, '\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                b.end_row();
                state = State::FieldStart;
            }
            (_, '\n') => {
                b.end_row();
                state = State::FieldStart;
            }
            // Lenient: text after a closing quote joins the field.
            (_, c) => {
                b.touched = true;
                b.field.push(c);
                state = State::Bare;
            }
        }
    }

    if state == State::Quoted {
        return Err(CoreError::malformed("unterminated quoted field"));
    }
    if b.touched || !b.field.is_empty() || !b.row.is_empty() {
        b.end_row();
    }
    Ok(b.rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    #[test]
    fn empty_table_has_no_header() {
        assert_eq!(encode_table(&[]), "");
        assert!(decode_table("").unwrap().is_empty());
    }

    #[test]
    fn header_only_table_is_empty() {
        assert!(decode_table("name,qty\r\n").unwrap().is_empty());
    }

    #[test]
    fn encodes_header_from_first_record() {
        let records = vec![
            record(&[("name", "x"), ("qty", "1")]),
            record(&[("name", "y"), ("qty", "2")]),
        ];
        assert_eq!(encode_table(&records), "name,qty\r\nx,1\r\ny,2\r\n");
    }

    #[test]
    fn later_records_follow_first_schema() {
        let records = vec![
            record(&[("name", "x"), ("qty", "1")]),
            record(&[("qty", "2"), ("color", "red")]),
        ];
        let text = encode_table(&records);
        assert_eq!(text, "name,qty\r\nx,1\r\n,2\r\n");

        let back = decode_table(&text).unwrap();
        assert_eq!(back[1], record(&[("name", ""), ("qty", "2")]));
    }

    #[test]
    fn quotes_special_characters() {
        let records = vec![record(&[("note", "a, \"b\"\nc")])];
        let text = encode_table(&records);
        assert_eq!(text, "note\r\n\"a, \"\"b\"\"\nc\"\r\n");
        assert_eq!(decode_table(&text).unwrap(), records);
    }

    #[test]
    fn lone_empty_field_survives() {
        let records = vec![record(&[("note", "")]), record(&[("note", "x")])];
        let text = encode_table(&records);
        assert_eq!(decode_table(&text).unwrap(), records);
    }

    #[test]
    fn accepts_lf_and_blank_lines() {
        let back = decode_table("name,qty\n\nx,1\ny,2").unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1], record(&[("name", "y"), ("qty", "2")]));
    }

    #[test]
    fn short_and_long_rows() {
        let back = decode_table("a,b,c\r\n1\r\n1,2,3,4\r\n").unwrap();
        assert_eq!(back[0], record(&[("a", "1"), ("b", ""), ("c", "")]));
        assert_eq!(back[1], record(&[("a", "1"), ("b", "2"), ("c", "3")]));
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let err = decode_table("note\r\n\"open").unwrap_err();
        assert!(matches!(err, CoreError::Malformed { .. }));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = decode_bytes(&[b'a', b'\n', 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, CoreError::Malformed { .. }));
    }

    proptest! {
        #[test]
        fn arbitrary_values_survive_encoding(
            values in prop::collection::vec("[a-z,\"\r\n ]{0,12}", 1..6)
        ) {
            let records: Vec<Record> = values
                .iter()
                .map(|v| Record::new().with_field("key", "k").with_field("value", v.clone()))
                .collect();
            let back = decode_table(&encode_table(&records)).unwrap();
            prop_assert_eq!(back, records);
        }
    }
}
