//! Little-endian record codec shared by every characteristic.
//!
//! Records are assembled field by field into a bounded buffer. Fields are
//! appended in call order and never reordered, so a record's layout is exactly
//! the sequence of `put_*` calls its [`Encode`] implementation makes.

mod error;

pub use error::CodecError;

/// Largest value any characteristic in this crate carries (Body Composition
/// Measurement with every optional field present is 30 octets).
pub const MAX_RECORD_LEN: usize = 32;

pub type Record = heapless::Vec<u8, MAX_RECORD_LEN>;

/// Values that serialize into a characteristic record.
pub trait Encode {
    /// Exact number of octets [`Encode::encode_into`] appends
    fn encoded_len(&self) -> usize;

    fn encode_into(&self, builder: &mut RecordBuilder) -> Result<(), CodecError>;

    fn encode(&self) -> Result<Record, CodecError> {
        let mut builder = RecordBuilder::new();
        self.encode_into(&mut builder)?;
        debug_assert_eq!(builder.len(), self.encoded_len());
        Ok(builder.finish())
    }
}

/// Values parsed out of a written attribute.
pub trait Decode: Sized {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError>;
}

/// Byte builder that tracks its own write position.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    buffer: Record,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.buffer.push(value).map_err(|_| CodecError::Overflow)
    }

    pub fn put_u16_le(&mut self, value: u16) -> Result<(), CodecError> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_u32_le(&mut self, value: u32) -> Result<(), CodecError> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_slice(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.buffer
            .extend_from_slice(bytes)
            .map_err(|_| CodecError::Overflow)
    }

    pub fn put<T: Encode>(&mut self, value: &T) -> Result<(), CodecError> {
        value.encode_into(self)
    }

    /// Hand out the finished record; the builder is consumed so the bytes can no
    /// longer change.
    pub fn finish(self) -> Record {
        self.buffer
    }
}

/// Cursor over a received attribute value.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        let available = self.data.len() - self.position;
        if available < count {
            return Err(CodecError::UnexpectedEnd {
                needed: count,
                available,
            });
        }

        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16_le(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn get_u32_le(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn get<T: Decode>(&mut self) -> Result<T, CodecError> {
        T::decode(self)
    }
}

impl Encode for u32 {
    fn encoded_len(&self) -> usize {
        4
    }

    fn encode_into(&self, builder: &mut RecordBuilder) -> Result<(), CodecError> {
        builder.put_u32_le(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_byte_fields_are_little_endian() {
        let mut builder = RecordBuilder::new();
        builder.put_u8(0xAA).unwrap();
        builder.put_u16_le(0x1234).unwrap();
        builder.put_u32_le(0xDEADBEEF).unwrap();

        assert_eq!(
            builder.finish().as_slice(),
            &[0xAA, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE]
        );
    }

    #[test]
    fn test_builder_refuses_to_grow_past_capacity() {
        let mut builder = RecordBuilder::new();
        builder.put_slice(&[0; MAX_RECORD_LEN]).unwrap();

        assert_eq!(builder.put_u8(1), Err(CodecError::Overflow));
        assert_eq!(builder.len(), MAX_RECORD_LEN);
    }

    #[test]
    fn test_reader_reports_short_input() {
        let mut reader = Reader::new(&[0x01, 0x0F]);
        assert_eq!(reader.get_u8(), Ok(0x01));
        assert_eq!(
            reader.get_u16_le(),
            Err(CodecError::UnexpectedEnd {
                needed: 2,
                available: 1
            })
        );
        // A failed read does not consume anything
        assert_eq!(reader.remaining(), &[0x0F]);
    }

    #[test]
    fn test_u32_encodes_as_four_octets() {
        let record = 0x0004_0000u32.encode().unwrap();
        assert_eq!(record.as_slice(), &[0x00, 0x00, 0x04, 0x00]);
    }
}
