//! Encoder module
//!
//! This module packs a field map into the binary layout of a schema,
//! with or without the 2-byte `'$' id` header.

use crate::error::EncodeError;
use crate::protocol::{pack_field, FieldMap, Value, HEADER_SIZE, START_BYTE};
use crate::schema::{get_schema, MessageSchema};

/// Encode a message with its header
///
/// Fails if the schema is unknown, if a schema field is missing from
/// `fields`, if `fields` holds a key the schema does not declare, or if a
/// value has the wrong kind for its field.
pub fn encode(schema_name: &str, fields: &FieldMap) -> Result<Vec<u8>, EncodeError> {
    let schema = get_schema(schema_name)?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + schema.payload_len());
    buf.push(START_BYTE);
    buf.push(schema.id);
    pack_payload(schema, fields, &mut buf)?;
    Ok(buf)
}

/// Encode a message payload without the header
pub fn encode_headerless(schema_name: &str, fields: &FieldMap) -> Result<Vec<u8>, EncodeError> {
    let schema = get_schema(schema_name)?;
    let mut buf = Vec::with_capacity(schema.payload_len());
    pack_payload(schema, fields, &mut buf)?;
    Ok(buf)
}

/// Pack every schema field, in declared order, onto `buf`
pub(crate) fn pack_payload(
    schema: &MessageSchema,
    fields: &FieldMap,
    buf: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    if let Some(extra) = fields.keys().find(|k| schema.field(k).is_none()) {
        return Err(EncodeError::UnexpectedField {
            schema: schema.name.to_string(),
            field: extra.clone(),
        });
    }

    for field in schema.fields {
        let value = fields
            .get(field.name)
            .ok_or_else(|| EncodeError::MissingField {
                schema: schema.name.to_string(),
                field: field.name.to_string(),
            })?;
        if !pack_field(field.wire_type, value, buf) {
            return Err(EncodeError::TypeMismatch {
                schema: schema.name.to_string(),
                field: field.name.to_string(),
            });
        }
    }
    Ok(())
}

/// Pack values given in schema field order, header included
pub(crate) fn encode_indexed(
    schema: &MessageSchema,
    values: &[Value],
) -> Result<Vec<u8>, EncodeError> {
    if values.len() != schema.fields.len() {
        let field = schema
            .fields
            .get(values.len())
            .map(|f| f.name.to_string())
            .unwrap_or_default();
        return Err(EncodeError::MissingField {
            schema: schema.name.to_string(),
            field,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + schema.payload_len());
    buf.push(START_BYTE);
    buf.push(schema.id);
    for (field, value) in schema.fields.iter().zip(values) {
        if !pack_field(field.wire_type, value, &mut buf) {
            return Err(EncodeError::TypeMismatch {
                schema: schema.name.to_string(),
                field: field.name.to_string(),
            });
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::protocol::Value;

    fn waypoint_fields() -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("lattitude".into(), Value::Float(-22.5));
        fields.insert("longitude".into(), Value::Float(-47.25));
        fields.insert("holding_time".into(), Value::Int(30));
        fields
    }

    #[test]
    fn test_encode_header() {
        let bytes = encode("waypoint", &waypoint_fields()).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 10);
        assert_eq!(bytes[0], b'$');
        assert_eq!(bytes[1], 2);
        assert_eq!(&bytes[2..6], &(-22.5f32).to_le_bytes());
        assert_eq!(&bytes[6..10], &(-47.25f32).to_le_bytes());
        assert_eq!(&bytes[10..12], &30u16.to_le_bytes());
    }

    #[test]
    fn test_encode_headerless() {
        let with = encode("waypoint", &waypoint_fields()).unwrap();
        let without = encode_headerless("waypoint", &waypoint_fields()).unwrap();
        assert_eq!(&with[HEADER_SIZE..], &without[..]);
    }

    #[test]
    fn test_encode_unknown_schema() {
        let result = encode("weather", &FieldMap::new());
        assert_eq!(
            result,
            Err(EncodeError::Schema(SchemaError::NotFound("weather".into())))
        );
    }

    #[test]
    fn test_encode_missing_field() {
        let mut fields = waypoint_fields();
        fields.remove("holding_time");
        let result = encode("waypoint", &fields);
        assert_eq!(
            result,
            Err(EncodeError::MissingField {
                schema: "waypoint".into(),
                field: "holding_time".into(),
            })
        );
    }

    #[test]
    fn test_encode_extra_field() {
        let mut fields = waypoint_fields();
        fields.insert("altitude".into(), Value::Float(3.0));
        assert!(matches!(
            encode("waypoint", &fields),
            Err(EncodeError::UnexpectedField { ref field, .. }) if field == "altitude"
        ));
    }

    #[test]
    fn test_encode_type_mismatch() {
        let mut fields = FieldMap::new();
        fields.insert("text".into(), Value::Int(5));
        assert!(matches!(
            encode("message", &fields),
            Err(EncodeError::TypeMismatch { .. })
        ));
    }
}
