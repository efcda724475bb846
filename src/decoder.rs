//! Decoder module
//!
//! This module unpacks header-carrying or bare payloads back into field
//! maps. Decoding is all-or-nothing: a length mismatch rejects the whole
//! buffer, nothing is partially decoded.

use crate::error::DecodeError;
use crate::protocol::{unpack_field, DecodedMessage, FieldMap, Value, HEADER_SIZE, START_BYTE};
use crate::schema::{get_schema, get_schema_by_id, MessageSchema};

/// Decode a header-carrying message
pub fn decode(data: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let (schema, payload) = split_header(data)?;
    unpack_payload(schema, payload)
}

/// Decode a bare payload of a known schema
pub fn decode_headerless(schema_name: &str, data: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let schema = get_schema(schema_name)?;
    unpack_payload(schema, data)
}

/// Validate the header and resolve its schema
pub(crate) fn split_header(data: &[u8]) -> Result<(&'static MessageSchema, &[u8]), DecodeError> {
    match data.first() {
        Some(&b) if b != START_BYTE => return Err(DecodeError::InvalidHeader(b)),
        _ if data.len() < HEADER_SIZE => {
            return Err(DecodeError::BufferTooShort {
                needed: HEADER_SIZE,
                available: data.len(),
            })
        }
        _ => {}
    }
    let schema = get_schema_by_id(data[1]).map_err(|_| DecodeError::UnknownSchemaId(data[1]))?;
    Ok((schema, &data[HEADER_SIZE..]))
}

fn unpack_payload(
    schema: &'static MessageSchema,
    payload: &[u8],
) -> Result<DecodedMessage, DecodeError> {
    let values = unpack_values(schema, payload)?;
    let fields = schema
        .fields
        .iter()
        .zip(values)
        .map(|(field, value)| (field.name.to_string(), value))
        .collect::<FieldMap>();

    Ok(DecodedMessage {
        name: schema.name,
        schema_id: schema.id,
        fields,
    })
}

/// Unpack a payload into values indexed like `schema.fields`
pub(crate) fn unpack_values(
    schema: &MessageSchema,
    payload: &[u8],
) -> Result<Vec<Value>, DecodeError> {
    let expected = schema.payload_len();
    if payload.len() != expected {
        return Err(DecodeError::MalformedPayload {
            schema: schema.name.to_string(),
            expected,
            actual: payload.len(),
        });
    }

    let mut values = Vec::with_capacity(schema.fields.len());
    let mut offset = 0;
    for field in schema.fields {
        let width = field.wire_type.width();
        values.push(unpack_field(field.wire_type, &payload[offset..offset + width]));
        offset += width;
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{encode, encode_headerless};
    use crate::protocol::Value;

    fn control(kind: i64) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("type".into(), Value::Int(kind));
        fields
    }

    #[test]
    fn test_decode_roundtrip() {
        let bytes = encode("control", &control(128)).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.name, "control");
        assert_eq!(decoded.schema_id, 3);
        assert_eq!(decoded.fields, control(128));
    }

    #[test]
    fn test_decode_headerless_roundtrip() {
        let bytes = encode_headerless("control", &control(2)).unwrap();
        let decoded = decode_headerless("control", &bytes).unwrap();
        assert_eq!(decoded.get("type"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_decode_invalid_header() {
        let mut bytes = encode("control", &control(1)).unwrap();
        bytes[0] = b'#';
        assert_eq!(decode(&bytes), Err(DecodeError::InvalidHeader(b'#')));
        assert_eq!(decode(&[b'#']), Err(DecodeError::InvalidHeader(b'#')));
    }

    #[test]
    fn test_decode_unknown_id() {
        assert_eq!(decode(&[b'$', 42, 0]), Err(DecodeError::UnknownSchemaId(42)));
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut bytes = encode("control", &control(1)).unwrap();
        bytes.push(0);
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::MalformedPayload {
                schema: "control".into(),
                expected: 1,
                actual: 2,
            })
        );
        assert!(matches!(
            decode(&[b'$', 3]),
            Err(DecodeError::MalformedPayload { actual: 0, .. })
        ));
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            decode(&[b'$']),
            Err(DecodeError::BufferTooShort { needed: 2, available: 1 })
        ));
        assert!(matches!(
            decode(&[]),
            Err(DecodeError::BufferTooShort { needed: 2, available: 0 })
        ));
    }

    #[test]
    fn test_decode_headerless_unknown_schema() {
        assert!(matches!(
            decode_headerless("nope", &[0]),
            Err(DecodeError::Schema(_))
        ));
    }
}
