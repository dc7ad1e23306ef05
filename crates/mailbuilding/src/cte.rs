use crate::sevenbit::SafeByteBuffer;
use crate::{MailBuildError, Result};
use std::str::FromStr;

/// RFC 2045 base64: the MIME alphabet wrapped at 76 columns with CRLF,
/// tolerant of whitespace when decoding.
pub const BASE64_RFC2045: data_encoding::Encoding = data_encoding_macro::new_encoding! {
    symbols: "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/",
    padding: '=',
    ignore: " \r\n\t",
    wrap_width: 76,
    wrap_separator: "\r\n",
};

/// Encoded content before the soft-break `=`; keeps every emitted line
/// at or under 76 characters.
const QP_SOFT_LIMIT: usize = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    QuotedPrintable,
    Base64,
}

impl ContentTransferEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Binary => "binary",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
        }
    }

    /// One-shot encode. Only `7bit`, `base64` and `quoted-printable`
    /// have a 7-bit representation this library can emit.
    pub fn encode(&self, data: &[u8]) -> Result<SafeByteBuffer> {
        match self {
            Self::SevenBit => encode_7bit(data),
            Self::Base64 => Ok(encode_base64(data)),
            Self::QuotedPrintable => Ok(encode_quoted_printable(data)),
            Self::EightBit | Self::Binary => {
                Err(MailBuildError::Non7bitRepresentation(self.label().to_string()))
            }
        }
    }
}

impl FromStr for ContentTransferEncoding {
    type Err = MailBuildError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("7bit") {
            Ok(Self::SevenBit)
        } else if s.eq_ignore_ascii_case("8bit") {
            Ok(Self::EightBit)
        } else if s.eq_ignore_ascii_case("binary") {
            Ok(Self::Binary)
        } else if s.eq_ignore_ascii_case("quoted-printable") {
            Ok(Self::QuotedPrintable)
        } else if s.eq_ignore_ascii_case("base64") {
            Ok(Self::Base64)
        } else {
            Err(MailBuildError::InvalidContentTransferEncoding(
                s.to_string(),
            ))
        }
    }
}

impl std::fmt::Display for ContentTransferEncoding {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.write_str(self.label())
    }
}

/// True when the data contains a CR or LF that is not part of a CRLF
/// pair.
pub fn has_lone_cr_or_lf(data: &[u8]) -> bool {
    memchr::memchr2_iter(b'\r', b'\n', data).any(|i| match data[i] {
        b'\r' => data.get(i + 1) != Some(&b'\n'),
        _ => i == 0 || data[i - 1] != b'\r',
    })
}

/// Rewrite bare CR and LF to CRLF; text bodies go through this before
/// transfer encoding.
pub(crate) fn normalize_line_endings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\r\n");
            }
            '\n' => out.push_str("\r\n"),
            c => out.push(c),
        }
    }
    out
}

/// Pass-through for payloads that are already wire-ready.
pub fn encode_7bit(data: &[u8]) -> Result<SafeByteBuffer> {
    if data.iter().any(|&b| b > 0x7f) || has_lone_cr_or_lf(data) {
        return Err(MailBuildError::CannotEncode);
    }
    SafeByteBuffer::from_bytes(data)
}

pub fn encode_base64(data: &[u8]) -> SafeByteBuffer {
    SafeByteBuffer::from_validated(BASE64_RFC2045.encode(data).into_bytes())
}

fn is_qp_literal(b: u8) -> bool {
    (0x20..=0x7e).contains(&b) && b != b'='
}

/// Append quoted-printable tokens for `data`, inserting soft breaks so
/// no line exceeds 76 characters. `line_len` carries the current line
/// length across calls.
pub(crate) fn qp_encode_chunk(data: &[u8], out: &mut Vec<u8>, line_len: &mut usize) {
    for &b in data {
        let token_len = if is_qp_literal(b) { 1 } else { 3 };
        if *line_len + token_len > QP_SOFT_LIMIT {
            out.extend_from_slice(b"=\r\n");
            *line_len = 0;
        }
        if is_qp_literal(b) {
            out.push(b);
        } else {
            out.push(b'=');
            out.extend_from_slice(format!("{b:02X}").as_bytes());
        }
        *line_len += token_len;
    }
}

pub fn encode_quoted_printable(data: &[u8]) -> SafeByteBuffer {
    let mut out = Vec::with_capacity(data.len() + data.len() / 4);
    let mut line_len = 0;
    qp_encode_chunk(data, &mut out, &mut line_len);
    SafeByteBuffer::from_validated(out)
}
