use crate::{MailBuildError, Result};

/// A byte whose top bit is clear. Everything a mail message emits is a
/// sequence of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SevenBitByte(u8);

impl SevenBitByte {
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for SevenBitByte {
    type Error = MailBuildError;
    fn try_from(b: u8) -> Result<Self> {
        if b <= 0x7f {
            Ok(Self(b))
        } else {
            Err(MailBuildError::CannotEncode)
        }
    }
}

impl From<SevenBitByte> for u8 {
    fn from(b: SevenBitByte) -> u8 {
        b.0
    }
}

impl From<SevenBitByte> for char {
    fn from(b: SevenBitByte) -> char {
        b.0 as char
    }
}

impl std::ops::Sub for SevenBitByte {
    type Output = u8;
    fn sub(self, rhs: Self) -> u8 {
        self.0.wrapping_sub(rhs.0)
    }
}

/// Append-only, randomly addressable run of 7-bit bytes. The invariant
/// is established at construction and preserved by every mutator, so
/// readers never need to re-validate.
///
/// A buffer may carry a capacity limit, in which case writes beyond it
/// fail with [`MailBuildError::HasReachedCapacity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafeByteBuffer {
    bytes: Vec<u8>,
    limit: Option<usize>,
}

impl SafeByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            bytes: vec![],
            limit: Some(limit),
        }
    }

    /// Validating copy.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.iter().any(|&b| b > 0x7f) {
            return Err(MailBuildError::CannotEncode);
        }
        Ok(Self {
            bytes: data.to_vec(),
            limit: None,
        })
    }

    pub fn from_ascii_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }

    /// For producers whose output is 7-bit by construction.
    pub(crate) fn from_validated(bytes: Vec<u8>) -> Self {
        debug_assert!(bytes.iter().all(|&b| b <= 0x7f));
        Self { bytes, limit: None }
    }

    fn check_capacity(&self, additional: usize) -> Result<()> {
        match self.limit {
            Some(limit) if self.bytes.len() + additional > limit => {
                Err(MailBuildError::HasReachedCapacity)
            }
            _ => Ok(()),
        }
    }

    pub fn push(&mut self, b: SevenBitByte) -> Result<()> {
        self.check_capacity(1)?;
        self.bytes.push(b.value());
        Ok(())
    }

    /// Concatenation of two validated buffers cannot break the
    /// invariant.
    pub fn extend_from_buffer(&mut self, other: &SafeByteBuffer) -> Result<()> {
        self.check_capacity(other.len())?;
        self.bytes.extend_from_slice(other.as_bytes());
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<SevenBitByte> {
        self.bytes.get(index).map(|&b| SevenBitByte(b))
    }

    /// Lossless by the invariant; "lossy" only in the signature it
    /// borrows from the standard library.
    pub fn to_lossy_string(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }
}

impl std::ops::Index<usize> for SafeByteBuffer {
    type Output = u8;
    fn index(&self, index: usize) -> &u8 {
        &self.bytes[index]
    }
}

impl std::io::Write for SafeByteBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.iter().any(|&b| b > 0x7f) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "byte with top bit set",
            ));
        }
        if self.check_capacity(buf.len()).is_err() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "buffer capacity reached",
            ));
        }
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn byte_invariant() {
        assert!(SevenBitByte::try_from(0x7f).is_ok());
        assert_eq!(
            SevenBitByte::try_from(0x80),
            Err(MailBuildError::CannotEncode)
        );
        let a = SevenBitByte::try_from(b'z').unwrap();
        let b = SevenBitByte::try_from(b'a').unwrap();
        assert_eq!(a - b, 25);
    }

    #[test]
    fn buffer_validates() {
        assert!(SafeByteBuffer::from_bytes(b"hello\r\n").is_ok());
        assert_eq!(
            SafeByteBuffer::from_bytes(&[b'a', 0xc3, 0xa9]),
            Err(MailBuildError::CannotEncode)
        );
    }

    #[test]
    fn capacity_limit() {
        let mut buf = SafeByteBuffer::with_capacity_limit(4);
        buf.extend_from_buffer(&SafeByteBuffer::from_ascii_str("abcd").unwrap())
            .unwrap();
        assert_eq!(
            buf.push(SevenBitByte::try_from(b'e').unwrap()),
            Err(MailBuildError::HasReachedCapacity)
        );
        assert_eq!(buf.as_bytes(), b"abcd");
    }

    #[test]
    fn write_impl_rejects_high_bytes() {
        let mut buf = SafeByteBuffer::new();
        assert!(buf.write_all(b"ok").is_ok());
        assert!(buf.write_all(&[0xff]).is_err());
        assert_eq!(buf.as_bytes(), b"ok");
    }

    #[test]
    fn indexing() {
        let buf = SafeByteBuffer::from_ascii_str("abc").unwrap();
        assert_eq!(buf[1], b'b');
        assert_eq!(buf.get(2).map(char::from), Some('c'));
        assert_eq!(buf.get(3), None);
    }
}
