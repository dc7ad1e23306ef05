use crate::cte::{has_lone_cr_or_lf, qp_encode_chunk, ContentTransferEncoding, BASE64_RFC2045};
use crate::fragment::FragmentIterator;
use crate::sevenbit::SafeByteBuffer;
use crate::{MailBuildError, Result};
use std::io::Read;

/// 57 source bytes fill one 76-character base64 line exactly.
const BASE64_LINE_BYTES: usize = 57;
const BASE64_LINES_PER_FRAGMENT: usize = 16;
const READ_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Reading,
    Drained,
    Failed,
}

/// Wraps a byte source and yields transfer-encoded fragments, one
/// buffered read at a time. Nothing is ever buffered beyond a single
/// fragment.
pub struct CteStream<R: Read> {
    encoding: ContentTransferEncoding,
    source: R,
    state: StreamState,
}

impl<R: Read> CteStream<R> {
    pub fn new(encoding: ContentTransferEncoding, source: R) -> Result<Self> {
        match encoding {
            ContentTransferEncoding::SevenBit
            | ContentTransferEncoding::Base64
            | ContentTransferEncoding::QuotedPrintable => Ok(Self {
                encoding,
                source,
                state: StreamState::Idle,
            }),
            other => Err(MailBuildError::Non7bitRepresentation(
                other.label().to_string(),
            )),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    fn fail(&mut self, err: MailBuildError) -> MailBuildError {
        tracing::trace!("cte stream entering failed state: {err}");
        self.state = StreamState::Failed;
        err
    }

    pub fn next_fragment(&mut self) -> Result<Option<SafeByteBuffer>> {
        match self.state {
            StreamState::Drained => return Ok(None),
            StreamState::Failed => return Err(MailBuildError::UnexpectedError),
            StreamState::Idle | StreamState::Reading => {}
        }
        self.state = StreamState::Reading;

        let want = match self.encoding {
            ContentTransferEncoding::Base64 => BASE64_LINE_BYTES * BASE64_LINES_PER_FRAGMENT,
            _ => READ_BUFFER_SIZE,
        };
        let mut buf = vec![0u8; want];
        let n = match read_full(&mut self.source, &mut buf) {
            Ok(n) => n,
            Err(_) => return Err(self.fail(MailBuildError::UnexpectedError)),
        };
        if n == 0 {
            tracing::trace!("cte stream drained ({})", self.encoding);
            self.state = StreamState::Drained;
            return Ok(None);
        }
        buf.truncate(n);

        match self.encoding {
            ContentTransferEncoding::SevenBit => {
                if buf.iter().any(|&b| b > 0x7f) || has_lone_cr_or_lf(&buf) {
                    return Err(self.fail(MailBuildError::CannotEncode));
                }
                Ok(Some(SafeByteBuffer::from_validated(buf)))
            }
            ContentTransferEncoding::Base64 => {
                // full fragments are 57-byte aligned, so every line is
                // exactly 76 columns and self-terminated
                Ok(Some(SafeByteBuffer::from_validated(
                    BASE64_RFC2045.encode(&buf).into_bytes(),
                )))
            }
            ContentTransferEncoding::QuotedPrintable => {
                let mut out = Vec::with_capacity(buf.len() + buf.len() / 4);
                let mut line_len = 0;
                qp_encode_chunk(&buf, &mut out, &mut line_len);
                match line_len {
                    0 => {}
                    l if l < 76 => out.extend_from_slice(b"=\r\n"),
                    76 => {
                        // the next fragment continues this line, so it
                        // must be soft-terminated without splitting an
                        // =HH triplet across the break
                        let start = out.len() - 76;
                        let pos = if out[start + 73] == b'=' {
                            start + 73
                        } else {
                            start + 75
                        };
                        out.splice(pos..pos, *b"=\r\n");
                    }
                    _ => return Err(self.fail(MailBuildError::UnexpectedError)),
                }
                Ok(Some(SafeByteBuffer::from_validated(out)))
            }
            ContentTransferEncoding::EightBit | ContentTransferEncoding::Binary => {
                Err(self.fail(MailBuildError::Non7bitRepresentation(
                    self.encoding.label().to_string(),
                )))
            }
        }
    }
}

impl<R: Read> FragmentIterator for CteStream<R> {
    fn next_fragment(&mut self) -> Result<Option<SafeByteBuffer>> {
        CteStream::next_fragment(self)
    }
}

fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match source.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}
