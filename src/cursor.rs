//! Bounded big-endian reads over a byte buffer.
//!
//! Every read either returns the requested value and advances, or fails with
//! [`FingerprintError::Parse`] without moving. Nothing here can read past the
//! end of the underlying slice.
use crate::error::FingerprintError;
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{IResult, Parser};

type NomResult<'a, T> = IResult<&'a [u8], T, nom::error::Error<&'a [u8]>>;

#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, offset: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Number of bytes consumed since the cursor was created.
    #[must_use]
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn read_u8(&mut self, field: &str) -> Result<u8, FingerprintError> {
        let result: NomResult<'a, u8> = be_u8(self.input);
        self.advance(field, result)
    }

    pub fn read_u16(&mut self, field: &str) -> Result<u16, FingerprintError> {
        let result: NomResult<'a, u16> = be_u16(self.input);
        self.advance(field, result)
    }

    pub fn read_u24(&mut self, field: &str) -> Result<u32, FingerprintError> {
        let result: NomResult<'a, u32> = be_u24(self.input);
        self.advance(field, result)
    }

    /// Borrow the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize, field: &str) -> Result<&'a [u8], FingerprintError> {
        let result: NomResult<'a, &'a [u8]> = take(len).parse(self.input);
        self.advance(field, result)
    }

    pub fn skip(&mut self, len: usize, field: &str) -> Result<(), FingerprintError> {
        self.read_bytes(len, field).map(|_| ())
    }

    /// Split off the next `len` bytes as an independent cursor.
    pub fn sub_cursor(&mut self, len: usize, field: &str) -> Result<ByteCursor<'a>, FingerprintError> {
        let offset = self.offset;
        let bytes = self.read_bytes(len, field)?;
        Ok(ByteCursor { input: bytes, offset })
    }

    fn advance<T>(&mut self, field: &str, result: NomResult<'a, T>) -> Result<T, FingerprintError> {
        match result {
            Ok((rest, value)) => {
                self.offset += self.input.len() - rest.len();
                self.input = rest;
                Ok(value)
            }
            Err(_) => Err(FingerprintError::Parse(format!(
                "truncated {field} at offset {} ({} bytes left)",
                self.offset,
                self.input.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian_values() {
        let data = [0x16, 0x03, 0x01, 0x00, 0x00, 0x2a, 0xff];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_u8("type").unwrap(), 0x16);
        assert_eq!(cursor.read_u16("version").unwrap(), 0x0301);
        assert_eq!(cursor.read_u24("length").unwrap(), 0x2a);
        assert_eq!(cursor.position(), 6);
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_failed_read_does_not_advance() {
        let data = [0x01];
        let mut cursor = ByteCursor::new(&data);

        assert!(cursor.read_u16("version").is_err());
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.read_u8("type").unwrap(), 0x01);
        assert!(cursor.read_u8("type").is_err());
    }

    #[test]
    fn test_read_bytes_past_end_fails() {
        let data = [1, 2, 3];
        let mut cursor = ByteCursor::new(&data);

        assert!(cursor.read_bytes(4, "body").is_err());
        assert_eq!(cursor.read_bytes(3, "body").unwrap(), &[1, 2, 3]);
        assert!(cursor.is_empty());
        assert_eq!(cursor.read_bytes(0, "empty").unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_sub_cursor_is_bounded() {
        let data = [0, 1, 2, 3, 4];
        let mut cursor = ByteCursor::new(&data);
        cursor.skip(1, "skip").unwrap();

        let mut inner = cursor.sub_cursor(2, "inner").unwrap();
        assert_eq!(inner.read_u16("value").unwrap(), 0x0102);
        assert!(inner.read_u8("value").is_err());
        assert_eq!(cursor.read_u16("value").unwrap(), 0x0304);
    }

    #[test]
    fn test_error_names_field() {
        let mut cursor = ByteCursor::new(&[]);
        let err = cursor.read_u8("session id length").unwrap_err();
        assert!(err.to_string().contains("session id length"));
    }
}
