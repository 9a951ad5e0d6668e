//! Chunk header codec and extension directives.
//!
//! # Wire Layout
//! ```text
//! ┌───────────────────────────────┬──────┐
//! │ length: 7 ASCII hex digits    │ type │   type = 'd' (DATA) | 'x' (EXTENSION)
//! └───────────────────────────────┴──────┘
//! followed by `length` payload bytes
//! ```
//!
//! A DATA chunk with length 0 (`0000000d`) terminates a message.

use crate::protocol::ProtocolError;

/// Number of header bytes carrying the payload length.
pub const LENGTH_DIGITS: usize = 7;

/// Total header width in bytes.
pub const HEADER_SIZE: usize = LENGTH_DIGITS + 1;

/// Largest payload a single header can describe.
pub const MAX_CHUNK_SIZE: usize = 0x0FFF_FFFF;

/// Header of the terminal chunk.
pub const TERMINAL_HEADER: [u8; HEADER_SIZE] = *b"0000000d";

const DATA_TAG: u8 = b'd';
const EXTENSION_TAG: u8 = b'x';

/// Chunk type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Message payload.
    Data,
    /// Out-of-band `key=value;` directives.
    Extension,
}

impl ChunkKind {
    fn tag(self) -> u8 {
        match self {
            ChunkKind::Data => DATA_TAG,
            ChunkKind::Extension => EXTENSION_TAG,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            DATA_TAG => Some(ChunkKind::Data),
            EXTENSION_TAG => Some(ChunkKind::Extension),
            _ => None,
        }
    }
}

/// Decoded chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub length: usize,
    pub kind: ChunkKind,
}

impl ChunkHeader {
    pub fn new(length: usize, kind: ChunkKind) -> Self {
        Self { length, kind }
    }

    /// True for the zero-length DATA chunk that ends a message.
    pub fn is_terminal(&self) -> bool {
        self.kind == ChunkKind::Data && self.length == 0
    }

    /// Encode this header into its wire form.
    pub fn encode(&self) -> Result<[u8; HEADER_SIZE], ProtocolError> {
        encode_header(self.length, self.kind)
    }
}

/// Encode a header for a payload of `length` bytes.
pub fn encode_header(length: usize, kind: ChunkKind) -> Result<[u8; HEADER_SIZE], ProtocolError> {
    if length > MAX_CHUNK_SIZE {
        return Err(ProtocolError::ChunkTooLarge(length));
    }
    let digits = format!("{:07x}", length);
    let mut header = [0u8; HEADER_SIZE];
    header[..LENGTH_DIGITS].copy_from_slice(digits.as_bytes());
    header[LENGTH_DIGITS] = kind.tag();
    Ok(header)
}

/// Decode a header, rejecting anything that is not 7 hex digits and a known tag.
pub fn decode_header(raw: &[u8; HEADER_SIZE]) -> Result<ChunkHeader, ProtocolError> {
    let mut length = 0usize;
    for &byte in &raw[..LENGTH_DIGITS] {
        let digit = (byte as char).to_digit(16).ok_or_else(|| {
            ProtocolError::MalformedHeader(format!(
                "non-hex length byte 0x{:02x} in header {:?}",
                byte,
                String::from_utf8_lossy(raw)
            ))
        })?;
        length = (length << 4) | digit as usize;
    }

    let kind = ChunkKind::from_tag(raw[LENGTH_DIGITS]).ok_or_else(|| {
        ProtocolError::MalformedHeader(format!(
            "unknown chunk type 0x{:02x}",
            raw[LENGTH_DIGITS]
        ))
    })?;

    Ok(ChunkHeader { length, kind })
}

/// Status values carried by a `status=` extension clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Route the remaining DATA of this message to the error sink.
    Error,
    /// Orderly end of the session once the terminal chunk follows.
    Exit,
    /// Abandon the stream immediately.
    EmergencyExit,
    /// Anything else; ignored by readers.
    Other(String),
}

impl Status {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("error") {
            Status::Error
        } else if value == "exit!" {
            Status::EmergencyExit
        } else if value.eq_ignore_ascii_case("exit") {
            Status::Exit
        } else {
            Status::Other(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Error => "error",
            Status::Exit => "exit",
            Status::EmergencyExit => "exit!",
            Status::Other(s) => s,
        }
    }
}

/// One `key=value` clause of an extension chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Status(Status),
    Unknown(String),
}

/// Split extension text on `;` and classify each clause.
pub fn parse_extension(text: &str) -> Vec<Directive> {
    text.split(';')
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(|clause| match clause.strip_prefix("status=") {
            Some(value) => Directive::Status(Status::parse(value.trim())),
            None => Directive::Unknown(clause.to_string()),
        })
        .collect()
}

/// Render a single status clause, e.g. `status=error;`.
pub fn status_extension(status: &Status) -> String {
    format!("status={};", status.as_str())
}
