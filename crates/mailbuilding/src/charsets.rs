use crate::{MailBuildError, Result};
use encoding_rs::Encoding;

/// encoding_rs resolves the `us-ascii` label to windows-1252, which
/// would happily emit 8-bit output, so ASCII gets its own strict
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Ascii,
    Other(&'static Encoding),
}

/// A resolved IANA charset label: knows its canonical name and how to
/// turn a Unicode string into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharsetEncoder {
    engine: Engine,
}

const ASCII_LABELS: &[&str] = &[
    "us-ascii",
    "ascii",
    "ansi_x3.4-1968",
    "iso-ir-6",
    "us",
    "csascii",
];

impl CharsetEncoder {
    pub fn for_label(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        if ASCII_LABELS
            .iter()
            .any(|l| l.eq_ignore_ascii_case(trimmed))
        {
            return Ok(Self {
                engine: Engine::Ascii,
            });
        }
        match Encoding::for_label(trimmed.as_bytes()) {
            // output_encoding maps the decode-only members of the
            // registry (UTF-16, replacement) to an encodable one
            Some(enc) => Ok(Self {
                engine: Engine::Other(enc.output_encoding()),
            }),
            None => Err(MailBuildError::NoCharacterSetName(label.to_string())),
        }
    }

    pub fn utf8() -> Self {
        Self {
            engine: Engine::Other(encoding_rs::UTF_8),
        }
    }

    pub fn us_ascii() -> Self {
        Self {
            engine: Engine::Ascii,
        }
    }

    pub fn iso_2022_jp() -> Self {
        Self {
            engine: Engine::Other(encoding_rs::ISO_2022_JP),
        }
    }

    /// Canonical IANA name.
    pub fn name(&self) -> &'static str {
        match self.engine {
            Engine::Ascii => "us-ascii",
            Engine::Other(enc) => enc.name(),
        }
    }

    pub fn is_ascii(&self) -> bool {
        matches!(self.engine, Engine::Ascii)
    }

    pub fn is_utf8(&self) -> bool {
        matches!(self.engine, Engine::Other(enc) if enc == encoding_rs::UTF_8)
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self.engine {
            Engine::Ascii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err(self.conversion_failure(text))
                }
            }
            Engine::Other(enc) => {
                let (bytes, _, unmappable) = enc.encode(text);
                if unmappable {
                    Err(self.conversion_failure(text))
                } else {
                    Ok(bytes.into_owned())
                }
            }
        }
    }

    /// Length of `encode(text)` without materializing it for the
    /// encodings where that is knowable.
    pub fn encoded_len(&self, text: &str) -> Result<usize> {
        match self.engine {
            Engine::Ascii => {
                if text.is_ascii() {
                    Ok(text.len())
                } else {
                    Err(self.conversion_failure(text))
                }
            }
            Engine::Other(enc) if enc == encoding_rs::UTF_8 => Ok(text.len()),
            Engine::Other(_) => Ok(self.encode(text)?.len()),
        }
    }

    fn conversion_failure(&self, text: &str) -> MailBuildError {
        MailBuildError::DataConversionFailure {
            charset: self.name().to_string(),
            text: text.to_string(),
        }
    }
}
