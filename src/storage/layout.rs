use bytes::{Buf, BufMut, BytesMut};

use crate::utils::error::RecordError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
    pub signed: bool,
}

impl FieldSpec {
    pub const fn signed(name: &'static str, offset: usize, width: usize) -> Self {
        Self {
            name,
            offset,
            width,
            signed: true,
        }
    }

    pub const fn unsigned(name: &'static str, offset: usize, width: usize) -> Self {
        Self {
            name,
            offset,
            width,
            signed: false,
        }
    }

    fn end(&self) -> usize {
        self.offset + self.width
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub name: &'static str,
    pub size: usize,
    pub fields: &'static [FieldSpec],
}

impl RecordLayout {
    pub fn encode(&self, values: &[i64]) -> Vec<u8> {
        debug_assert_eq!(values.len(), self.fields.len(), "{} field count", self.name);

        let mut buf = BytesMut::zeroed(self.size);
        for (field, value) in self.fields.iter().zip(values) {
            let mut slot = &mut buf[field.offset..field.end()];
            slot.put_int_le(*value, field.width);
        }
        buf.to_vec()
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<i64>, RecordError> {
        if bytes.len() != self.size {
            return Err(RecordError::Length {
                record: self.name,
                expected: self.size,
                actual: bytes.len(),
            });
        }

        Ok(self
            .fields
            .iter()
            .map(|field| {
                let mut slot = &bytes[field.offset..field.end()];
                let raw = slot.get_uint_le(field.width);
                if field.signed && field.width < 8 {
                    let shift = 64 - 8 * field.width as u32;
                    ((raw << shift) as i64) >> shift
                } else {
                    raw as i64
                }
            })
            .collect())
    }

    pub fn is_packed(&self) -> bool {
        let mut expected = 0;
        for field in self.fields {
            if field.offset != expected || !(1..=8).contains(&field.width) {
                return false;
            }
            expected = field.end();
        }
        expected == self.size
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FIELDS: [FieldSpec; 3] = [
        FieldSpec::signed("a", 0, 2),
        FieldSpec::unsigned("b", 2, 4),
        FieldSpec::unsigned("flag", 6, 1),
    ];
    const SAMPLE: RecordLayout = RecordLayout {
        name: "sample",
        size: 7,
        fields: &SAMPLE_FIELDS,
    };

    #[test]
    fn test_encode_is_little_endian_in_table_order() {
        let bytes = SAMPLE.encode(&[-2, 0x0102_0304, 1]);
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x04, 0x03, 0x02, 0x01, 0x01]);
    }

    #[test]
    fn test_decode_sign_extends_signed_fields() {
        let values = SAMPLE.decode(&[0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00]).unwrap();
        assert_eq!(values, vec![-2, 0xFFFF_FFFF, 0]);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(matches!(
            SAMPLE.decode(&[0; 6]),
            Err(RecordError::Length { expected: 7, actual: 6, .. })
        ));
    }

    #[test]
    fn test_packed_check() {
        assert!(SAMPLE.is_packed());
        let gap = RecordLayout {
            size: 8,
            ..SAMPLE
        };
        assert!(!gap.is_packed());
    }
}
