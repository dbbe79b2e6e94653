//! Compiles a metadata field list into byte offsets and typed extractors.

use std::collections::HashMap;

use crate::error::{Error, FieldKind, Result};
use crate::extractors::{
    BlobExtractor, BoolExtractor, ByteExtractor, Float64Extractor, Int64Extractor,
    StringExtractor, TimeExtractor,
};
use crate::metadata::{DataType, Field, RawField};

/// The compiled record layout for a single YXDB file: field list, fixed-portion
/// byte size, and the per-kind extractors used to pull values out of a record
/// buffer.
#[derive(Debug)]
pub(crate) struct Schema {
    pub fields: Vec<Field>,
    pub fixed_size: usize,
    pub has_var: bool,
    name_to_index: HashMap<String, usize>,
    bool_extractors: HashMap<usize, BoolExtractor>,
    byte_extractors: HashMap<usize, ByteExtractor>,
    int64_extractors: HashMap<usize, Int64Extractor>,
    float64_extractors: HashMap<usize, Float64Extractor>,
    string_extractors: HashMap<usize, StringExtractor>,
    time_extractors: HashMap<usize, TimeExtractor>,
    blob_extractors: HashMap<usize, BlobExtractor>,
}

impl Schema {
    /// Compiles a schema from the raw `<Field>` elements in declaration order.
    pub fn from_field_list(fields: &[RawField]) -> Result<Schema> {
        let mut schema = Schema {
            fields: Vec::with_capacity(fields.len()),
            fixed_size: 0,
            has_var: false,
            name_to_index: HashMap::with_capacity(fields.len()),
            bool_extractors: HashMap::new(),
            byte_extractors: HashMap::new(),
            int64_extractors: HashMap::new(),
            float64_extractors: HashMap::new(),
            string_extractors: HashMap::new(),
            time_extractors: HashMap::new(),
            blob_extractors: HashMap::new(),
        };

        let mut start_at: usize = 0;
        for field in fields {
            let size = field.size.max(0) as usize;
            match field.xml_type.as_str() {
                "Int16" => {
                    let index = schema.push_field(&field.name, DataType::Int64);
                    schema
                        .int64_extractors
                        .insert(index, Int64Extractor::Int16 { start: start_at });
                    start_at += 3;
                }
                "Int32" => {
                    let index = schema.push_field(&field.name, DataType::Int64);
                    schema
                        .int64_extractors
                        .insert(index, Int64Extractor::Int32 { start: start_at });
                    start_at += 5;
                }
                "Int64" => {
                    let index = schema.push_field(&field.name, DataType::Int64);
                    schema
                        .int64_extractors
                        .insert(index, Int64Extractor::Int64 { start: start_at });
                    start_at += 9;
                }
                "Float" => {
                    let index = schema.push_field(&field.name, DataType::Float64);
                    schema
                        .float64_extractors
                        .insert(index, Float64Extractor::Float { start: start_at });
                    start_at += 5;
                }
                "Double" => {
                    let index = schema.push_field(&field.name, DataType::Float64);
                    schema
                        .float64_extractors
                        .insert(index, Float64Extractor::Double { start: start_at });
                    start_at += 9;
                }
                "FixedDecimal" => {
                    let index = schema.push_field(&field.name, DataType::Float64);
                    schema.float64_extractors.insert(
                        index,
                        Float64Extractor::FixedDecimal {
                            start: start_at,
                            field_length: size,
                        },
                    );
                    start_at += size + 1;
                }
                "String" => {
                    let index = schema.push_field(&field.name, DataType::String);
                    schema.string_extractors.insert(
                        index,
                        StringExtractor::Fixed {
                            start: start_at,
                            field_length: size,
                        },
                    );
                    start_at += size + 1;
                }
                "WString" => {
                    let index = schema.push_field(&field.name, DataType::String);
                    schema.string_extractors.insert(
                        index,
                        StringExtractor::WString {
                            start: start_at,
                            field_length: size,
                        },
                    );
                    start_at += size * 2 + 1;
                }
                "V_String" => {
                    let index = schema.push_field(&field.name, DataType::String);
                    schema
                        .string_extractors
                        .insert(index, StringExtractor::VString { start: start_at });
                    start_at += 4;
                    schema.has_var = true;
                }
                "V_WString" => {
                    let index = schema.push_field(&field.name, DataType::String);
                    schema
                        .string_extractors
                        .insert(index, StringExtractor::VWString { start: start_at });
                    start_at += 4;
                    schema.has_var = true;
                }
                "Date" => {
                    let index = schema.push_field(&field.name, DataType::Date);
                    schema
                        .time_extractors
                        .insert(index, TimeExtractor::Date { start: start_at });
                    start_at += 11;
                }
                "DateTime" => {
                    let index = schema.push_field(&field.name, DataType::Date);
                    schema
                        .time_extractors
                        .insert(index, TimeExtractor::DateTime { start: start_at });
                    start_at += 20;
                }
                "Bool" => {
                    let index = schema.push_field(&field.name, DataType::Boolean);
                    schema
                        .bool_extractors
                        .insert(index, BoolExtractor { start: start_at });
                    start_at += 1;
                }
                "Byte" => {
                    let index = schema.push_field(&field.name, DataType::Byte);
                    schema
                        .byte_extractors
                        .insert(index, ByteExtractor { start: start_at });
                    start_at += 2;
                }
                "Blob" | "SpatialObj" => {
                    let index = schema.push_field(&field.name, DataType::Blob);
                    schema
                        .blob_extractors
                        .insert(index, BlobExtractor { start: start_at });
                    start_at += 4;
                    schema.has_var = true;
                }
                other => {
                    return Err(Error::malformed(format!(
                        "field '{}' has unsupported type '{other}'",
                        field.name
                    )));
                }
            }
        }

        schema.fixed_size = start_at;
        Ok(schema)
    }

    fn push_field(&mut self, name: &str, data_type: DataType) -> usize {
        let index = self.fields.len();
        self.fields.push(Field {
            name: name.to_string(),
            data_type,
        });
        self.name_to_index.insert(name.to_string(), index);
        index
    }

    fn index_for_name(&self, name: &str) -> Result<usize> {
        self.name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| Error::unknown_name(name))
    }

    pub fn extract_bool(&self, index: usize, buf: &[u8]) -> Result<(bool, bool)> {
        self.bool_extractors
            .get(&index)
            .map(|e| e.extract(buf))
            .ok_or_else(|| Error::wrong_kind_index(index, FieldKind::Bool))
    }

    pub fn extract_bool_by_name(&self, name: &str, buf: &[u8]) -> Result<(bool, bool)> {
        self.extract_bool(self.index_for_name(name)?, buf)
    }

    pub fn extract_byte(&self, index: usize, buf: &[u8]) -> Result<(u8, bool)> {
        self.byte_extractors
            .get(&index)
            .map(|e| e.extract(buf))
            .ok_or_else(|| Error::wrong_kind_index(index, FieldKind::Byte))
    }

    pub fn extract_byte_by_name(&self, name: &str, buf: &[u8]) -> Result<(u8, bool)> {
        self.extract_byte(self.index_for_name(name)?, buf)
    }

    pub fn extract_int64(&self, index: usize, buf: &[u8]) -> Result<(i64, bool)> {
        self.int64_extractors
            .get(&index)
            .map(|e| e.extract(buf))
            .ok_or_else(|| Error::wrong_kind_index(index, FieldKind::Int64))
    }

    pub fn extract_int64_by_name(&self, name: &str, buf: &[u8]) -> Result<(i64, bool)> {
        self.extract_int64(self.index_for_name(name)?, buf)
    }

    pub fn extract_float64(&self, index: usize, buf: &[u8]) -> Result<(f64, bool)> {
        self.float64_extractors
            .get(&index)
            .map(|e| e.extract(buf))
            .ok_or_else(|| Error::wrong_kind_index(index, FieldKind::Float64))
    }

    pub fn extract_float64_by_name(&self, name: &str, buf: &[u8]) -> Result<(f64, bool)> {
        self.extract_float64(self.index_for_name(name)?, buf)
    }

    pub fn extract_string(&self, index: usize, buf: &[u8]) -> Result<(String, bool)> {
        self.string_extractors
            .get(&index)
            .map(|e| e.extract(buf))
            .ok_or_else(|| Error::wrong_kind_index(index, FieldKind::String))
    }

    pub fn extract_string_by_name(&self, name: &str, buf: &[u8]) -> Result<(String, bool)> {
        self.extract_string(self.index_for_name(name)?, buf)
    }

    pub fn extract_time(
        &self,
        index: usize,
        buf: &[u8],
    ) -> Result<(time::PrimitiveDateTime, bool)> {
        self.time_extractors
            .get(&index)
            .map(|e| e.extract(buf))
            .ok_or_else(|| Error::wrong_kind_index(index, FieldKind::Time))
    }

    pub fn extract_time_by_name(
        &self,
        name: &str,
        buf: &[u8],
    ) -> Result<(time::PrimitiveDateTime, bool)> {
        self.extract_time(self.index_for_name(name)?, buf)
    }

    pub fn extract_blob<'a>(&self, index: usize, buf: &'a [u8]) -> Result<Option<&'a [u8]>> {
        self.blob_extractors
            .get(&index)
            .map(|e| e.extract(buf))
            .ok_or_else(|| Error::wrong_kind_index(index, FieldKind::Blob))
    }

    pub fn extract_blob_by_name<'a>(&self, name: &str, buf: &'a [u8]) -> Result<Option<&'a [u8]>> {
        self.extract_blob(self.index_for_name(name)?, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, xml_type: &str, size: i32) -> RawField {
        RawField {
            name: name.to_string(),
            xml_type: xml_type.to_string(),
            size,
        }
    }

    #[test]
    fn accumulates_fixed_offsets() {
        let fields = vec![raw("a", "Int32", 0), raw("b", "Double", 0)];
        let schema = Schema::from_field_list(&fields).unwrap();
        assert_eq!(schema.fixed_size, 5 + 9);
        assert!(!schema.has_var);
    }

    #[test]
    fn marks_has_var_for_variable_fields() {
        let fields = vec![raw("a", "V_String", 0)];
        let schema = Schema::from_field_list(&fields).unwrap();
        assert!(schema.has_var);
        assert_eq!(schema.fixed_size, 4);
    }

    #[test]
    fn rejects_unknown_type() {
        let fields = vec![raw("a", "NotAType", 0)];
        assert!(Schema::from_field_list(&fields).is_err());
    }

    #[test]
    fn wrong_kind_access_is_an_error() {
        let fields = vec![raw("a", "Int32", 0)];
        let schema = Schema::from_field_list(&fields).unwrap();
        let buf = [0u8; 5];
        assert!(schema.extract_string(0, &buf).is_err());
        assert!(schema.extract_int64(0, &buf).is_ok());
    }

    #[test]
    fn unknown_name_is_an_error() {
        let fields = vec![raw("a", "Int32", 0)];
        let schema = Schema::from_field_list(&fields).unwrap();
        let buf = [0u8; 5];
        assert!(schema.extract_int64_by_name("b", &buf).is_err());
    }
}
