//! Cache operations and workload record parsing
//!
//! A recorded workload is a text file with one request per line, in the form
//! produced by YCSB's basic client:
//!
//! ```text
//! READ usertable user6622674881006267921 [ <all fields>]
//! INSERT usertable user8183854946431771896 [ field0=8#?(;?4%4*'4#0$"=/$ ]
//! UPDATE usertable user1234 [ field0=abc ]
//! ```
//!
//! `READ` becomes a GET; `INSERT` and `UPDATE` become SETs. Lines with any
//! other prefix (status output, blank lines) are skipped.
//!
//! # Value lengths
//!
//! SET lengths come from one of three sources (see [`ValueLengthSource`]):
//! the configured fixed length, the width of the bracketed field span, or a
//! trailing numeric field. The bracket form only works for single-field
//! records; anything else is rejected with [`RecordError::MultiField`].

pub mod producer;

pub use crate::config::workload::ValueLengthSource;
use std::fmt;
use thiserror::Error;

/// Width of `"[ field0="` plus `" ]"` around a single bracketed value
const BRACKET_OVERHEAD: usize = 10;

/// Request type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Get,
    Set,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Get => write!(f, "GET"),
            OpKind::Set => write!(f, "SET"),
        }
    }
}

/// A single request destined for the cache
///
/// For a GET, `value_length` is the length a hit is expected to have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OpKind,
    pub key: String,
    pub value_length: usize,
}

impl Operation {
    pub fn get(key: impl Into<String>, expected_length: usize) -> Self {
        Self {
            kind: OpKind::Get,
            key: key.into(),
            value_length: expected_length,
        }
    }

    pub fn set(key: impl Into<String>, value_length: usize) -> Self {
        Self {
            kind: OpKind::Set,
            key: key.into(),
            value_length,
        }
    }
}

/// Malformed workload record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    /// Bracket-derived lengths need exactly one `fieldN=` entry
    #[error("record has more than one field; bracket-derived value lengths need single-field records")]
    MultiField,

    #[error("record has no key")]
    MissingKey,

    #[error("cannot derive value length: {0}")]
    BadLength(String),

    #[error("value length {length} exceeds the maximum of {max} bytes")]
    ValueTooLarge { length: usize, max: usize },
}

/// How records are turned into operations
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Source of SET value lengths
    pub source: ValueLengthSource,
    /// Fixed SET length and expected GET length
    pub value_length: usize,
    /// Largest value the payload pool can supply
    pub max_value_length: usize,
}

/// Parse one workload line
///
/// Returns `Ok(None)` for lines that are not requests.
///
/// # Errors
///
/// Returns a `RecordError` for request lines that cannot be executed: no key,
/// an underivable or oversized value length, or a multi-field record when
/// lengths come from the bracket span.
pub fn parse_record(line: &str, options: &ParseOptions) -> Result<Option<Operation>, RecordError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut tokens = line.split_ascii_whitespace();

    let kind = match tokens.next() {
        Some("READ") => OpKind::Get,
        Some("INSERT") | Some("UPDATE") => OpKind::Set,
        _ => return Ok(None),
    };

    // Table name, then key
    let _table = tokens.next().ok_or(RecordError::MissingKey)?;
    let key = tokens
        .next()
        .filter(|k| !k.starts_with('['))
        .ok_or(RecordError::MissingKey)?;

    let value_length = match kind {
        OpKind::Get => options.value_length,
        OpKind::Set => match options.source {
            ValueLengthSource::Fixed => options.value_length,
            ValueLengthSource::Bracket => bracket_length(line)?,
            ValueLengthSource::Trailing => trailing_length(line)?,
        },
    };

    if value_length > options.max_value_length {
        return Err(RecordError::ValueTooLarge {
            length: value_length,
            max: options.max_value_length,
        });
    }

    Ok(Some(Operation {
        kind,
        key: key.to_string(),
        value_length,
    }))
}

/// Value width of a single-field `[ field0=<data> ]` span
fn bracket_length(line: &str) -> Result<usize, RecordError> {
    let open = line
        .find('[')
        .ok_or_else(|| RecordError::BadLength("no '[' in record".to_string()))?;
    let close = line
        .rfind(']')
        .filter(|&close| close > open)
        .ok_or_else(|| RecordError::BadLength("no ']' after '['".to_string()))?;

    match count_fields(&line[open + 1..close]) {
        0 => return Err(RecordError::BadLength("no field inside brackets".to_string())),
        1 => {}
        _ => return Err(RecordError::MultiField),
    }

    (close - open)
        .checked_sub(BRACKET_OVERHEAD)
        .ok_or_else(|| RecordError::BadLength("bracket span too short".to_string()))
}

/// Count `fieldN=` tokens that start a word
fn count_fields(span: &str) -> usize {
    let bytes = span.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while let Some(pos) = span[i..].find("field") {
        let start = i + pos;
        let at_word_start = start == 0 || bytes[start - 1] == b' ';
        let digits = bytes[start + 5..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let after = start + 5 + digits;
        if at_word_start && digits > 0 && bytes.get(after) == Some(&b'=') {
            count += 1;
        }
        i = start + 5;
    }
    count
}

/// Trailing numeric field at the end of the record
fn trailing_length(line: &str) -> Result<usize, RecordError> {
    let last = line
        .split_ascii_whitespace()
        .last()
        .ok_or_else(|| RecordError::BadLength("empty record".to_string()))?;
    last.parse()
        .map_err(|_| RecordError::BadLength(format!("trailing field '{}' is not a length", last)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(source: ValueLengthSource) -> ParseOptions {
        ParseOptions {
            source,
            value_length: 25,
            max_value_length: 100_000,
        }
    }

    #[test]
    fn test_read_becomes_get() {
        let op = parse_record(
            "READ usertable user6622674881006267921 [ <all fields>]\n",
            &options(ValueLengthSource::Fixed),
        )
        .unwrap()
        .unwrap();
        assert_eq!(op, Operation::get("user6622674881006267921", 25));
    }

    #[test]
    fn test_insert_and_update_become_set() {
        let opts = options(ValueLengthSource::Fixed);
        let insert = parse_record("INSERT usertable user1 [ field0=abc ]", &opts)
            .unwrap()
            .unwrap();
        assert_eq!(insert, Operation::set("user1", 25));

        let update = parse_record("UPDATE usertable user2 [ field0=abc ]", &opts)
            .unwrap()
            .unwrap();
        assert_eq!(update.kind, OpKind::Set);
        assert_eq!(update.key, "user2");
    }

    #[test]
    fn test_unrecognized_lines_skipped() {
        let opts = options(ValueLengthSource::Fixed);
        assert_eq!(parse_record("", &opts).unwrap(), None);
        assert_eq!(parse_record("   ", &opts).unwrap(), None);
        assert_eq!(parse_record("[OVERALL], RunTime(ms), 1234", &opts).unwrap(), None);
        assert_eq!(parse_record("SCAN usertable user1 10", &opts).unwrap(), None);
        assert_eq!(parse_record("read usertable user1", &opts).unwrap(), None);
    }

    #[test]
    fn test_bracket_length() {
        let opts = options(ValueLengthSource::Bracket);
        let op = parse_record("INSERT usertable user1 [ field0=abcdefghij ]", &opts)
            .unwrap()
            .unwrap();
        assert_eq!(op.value_length, 10);

        // Data may contain '=', ']' and spaces
        let op = parse_record("INSERT usertable user1 [ field0=a=b] c ]", &opts)
            .unwrap()
            .unwrap();
        assert_eq!(op.value_length, "a=b] c".len());
    }

    #[test]
    fn test_bracket_rejects_multi_field() {
        let opts = options(ValueLengthSource::Bracket);
        let err = parse_record("INSERT usertable user1 [ field0=abc field1=def ]", &opts).unwrap_err();
        assert_eq!(err, RecordError::MultiField);
    }

    #[test]
    fn test_bracket_errors() {
        let opts = options(ValueLengthSource::Bracket);
        assert!(matches!(
            parse_record("INSERT usertable user1", &opts),
            Err(RecordError::BadLength(_))
        ));
        assert!(matches!(
            parse_record("INSERT usertable user1 [ <all fields>]", &opts),
            Err(RecordError::BadLength(_))
        ));
        // READ never consults the bracket span
        assert!(parse_record("READ usertable user1 [ <all fields>]", &opts).is_ok());
    }

    #[test]
    fn test_trailing_length() {
        let opts = options(ValueLengthSource::Trailing);
        let op = parse_record("UPDATE usertable user9 [ field0=xyz ] 512", &opts)
            .unwrap()
            .unwrap();
        assert_eq!(op.value_length, 512);

        assert!(matches!(
            parse_record("UPDATE usertable user9 [ field0=xyz ]", &opts),
            Err(RecordError::BadLength(_))
        ));
    }

    #[test]
    fn test_missing_key() {
        let opts = options(ValueLengthSource::Fixed);
        assert_eq!(
            parse_record("READ usertable", &opts).unwrap_err(),
            RecordError::MissingKey
        );
        assert_eq!(
            parse_record("READ usertable [ <all fields>]", &opts).unwrap_err(),
            RecordError::MissingKey
        );
    }

    #[test]
    fn test_value_too_large() {
        let mut opts = options(ValueLengthSource::Trailing);
        opts.max_value_length = 100;
        assert_eq!(
            parse_record("INSERT usertable user1 [ field0=x ] 101", &opts).unwrap_err(),
            RecordError::ValueTooLarge {
                length: 101,
                max: 100
            }
        );
    }

    #[test]
    fn test_count_fields() {
        assert_eq!(count_fields(" field0=abc "), 1);
        assert_eq!(count_fields(" field0=abc field1=d field2=e "), 3);
        assert_eq!(count_fields(" field0=myfield1=x "), 1);
        assert_eq!(count_fields(" <all fields>"), 0);
    }
}
