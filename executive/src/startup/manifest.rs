//! Startup manifest parsing
//!
//! The manifest is a sequence of semicolon-terminated entries with
//! comma-separated fields; `!` terminates the file. A malformed or
//! over-long entry fails alone; parsing continues with the next entry.
//!
//! ```text
//! <ENTRY_KIND>, <path>, <entry_symbol>, <name>, <priority>,
//!     <stack_size>, <exception_action_hex>, <active_flag>;
//! ```
//!
//! `ENTRY_KIND` is `APP` or `LIB`; anything else fails that entry.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::apps::{ExceptionAction, StartParams};
use crate::config::{MAX_APP_NAME_LEN, MAX_MANIFEST_LINE, MAX_PATH_LEN, MAX_SYM_LEN};

/// One parsed manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEntry {
    /// Application to create.
    App(StartParams),
    /// Library to load and initialize.
    Lib {
        name: String,
        path: String,
        entry_symbol: String,
    },
    /// A well-formed entry whose activation flag is off.
    Disabled,
}

/// Per-entry parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestError {
    /// Entry exceeded the maximum line length.
    LineTooLong,
    /// Entry-kind token not recognized.
    UnknownKind,
    /// Wrong number of comma-separated fields.
    FieldCount(usize),
    /// A field failed to parse or exceeded its limit.
    BadField(&'static str),
    /// Input ended inside an unterminated entry.
    Unterminated,
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::LineTooLong => write!(f, "line too long"),
            ManifestError::UnknownKind => write!(f, "unknown entry kind"),
            ManifestError::FieldCount(n) => write!(f, "expected 8 fields, found {}", n),
            ManifestError::BadField(field) => write!(f, "bad field: {}", field),
            ManifestError::Unterminated => write!(f, "unterminated entry"),
        }
    }
}

/// Parse a whole manifest. Each element is one entry's outcome, in file
/// order, so the caller can log failures individually and keep going.
pub fn parse(text: &[u8]) -> Vec<Result<ManifestEntry, ManifestError>> {
    let mut out = Vec::new();
    let mut line: Vec<u8> = Vec::new();
    let mut skipping = false;

    for &byte in text {
        match byte {
            b'!' => {
                // End-of-file marker; anything after it is ignored.
                line.clear();
                skipping = false;
                break;
            }
            b';' => {
                if skipping {
                    skipping = false;
                } else {
                    out.push(parse_entry(&line));
                }
                line.clear();
            }
            _ if skipping => {}
            _ => {
                line.push(byte);
                if line.len() > MAX_MANIFEST_LINE {
                    out.push(Err(ManifestError::LineTooLong));
                    line.clear();
                    skipping = true;
                }
            }
        }
    }
    if !skipping && line.iter().any(|b| !b.is_ascii_whitespace()) {
        out.push(Err(ManifestError::Unterminated));
    }
    out
}

fn parse_entry(line: &[u8]) -> Result<ManifestEntry, ManifestError> {
    let text = core::str::from_utf8(line).map_err(|_| ManifestError::BadField("encoding"))?;
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    if fields.len() != 8 {
        return Err(ManifestError::FieldCount(fields.len()));
    }

    let kind = fields[0];
    let path = fields[1];
    let entry_symbol = fields[2];
    let name = fields[3];

    if name.is_empty() || name.len() > MAX_APP_NAME_LEN {
        return Err(ManifestError::BadField("name"));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(ManifestError::BadField("path"));
    }
    if entry_symbol.len() > MAX_SYM_LEN {
        return Err(ManifestError::BadField("entry_symbol"));
    }

    let priority: u8 = fields[4]
        .parse()
        .map_err(|_| ManifestError::BadField("priority"))?;
    let stack_size: u32 = fields[5]
        .parse()
        .map_err(|_| ManifestError::BadField("stack_size"))?;
    let exception_raw = fields[6]
        .strip_prefix("0x")
        .or_else(|| fields[6].strip_prefix("0X"))
        .ok_or(ManifestError::BadField("exception_action"))
        .and_then(|hex| {
            u32::from_str_radix(hex, 16).map_err(|_| ManifestError::BadField("exception_action"))
        })?;
    let active = fields[7] == "1";

    if !active {
        return Ok(ManifestEntry::Disabled);
    }

    match kind {
        "APP" => Ok(ManifestEntry::App(StartParams {
            file_path: String::from(path),
            entry_symbol: String::from(entry_symbol),
            name: String::from(name),
            priority,
            stack_size,
            exception_action: ExceptionAction::from_raw(exception_raw),
        })),
        "LIB" => Ok(ManifestEntry::Lib {
            name: String::from(name),
            path: String::from(path),
            entry_symbol: String::from(entry_symbol),
        }),
        _ => Err(ManifestError::UnknownKind),
    }
}
