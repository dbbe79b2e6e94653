//! The field list decoded from a YXDB file's UTF-16LE XML metadata section.

use crate::error::{Error, Result};

/// The logical type of a [`Field`], independent of its on-disk XML type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    Blob,
    Boolean,
    Byte,
    Date,
    Float64,
    Int64,
    String,
}

/// One column of a YXDB record, as declared in the file's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

/// A field exactly as it appears in the metadata XML, before being compiled into
/// a [`Field`] + byte offset by [`crate::schema::Schema`].
#[derive(Debug, Clone)]
pub(crate) struct RawField {
    pub name: String,
    pub xml_type: String,
    pub size: i32,
}

/// Decodes the UTF-16LE metadata payload (with its trailing NUL already trimmed)
/// into a UTF-8 `String` holding the metadata XML document.
pub(crate) fn decode_utf16_metadata(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::malformed(
            "metadata payload has an odd number of bytes",
        ));
    }
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::malformed(format!("invalid UTF-16 in metadata: {e}")))
}

/// Parses the metadata XML document into an ordered list of raw fields.
///
/// Looks for `<Field>` elements at the document root first, falling back to
/// `<RecordInfo><Field>...</Field></RecordInfo>` if none are found at the root.
pub(crate) fn parse_fields(xml: &str) -> Result<Vec<RawField>> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::malformed(format!("invalid metadata XML: {e}")))?;
    let root = doc.root_element();

    let mut fields: Vec<RawField> = root
        .children()
        .filter(|n| n.is_element() && n.has_tag_name("Field"))
        .map(raw_field_from_node)
        .collect::<Result<_>>()?;

    if fields.is_empty() {
        if let Some(record_info) = root
            .children()
            .find(|n| n.is_element() && n.has_tag_name("RecordInfo"))
        {
            fields = record_info
                .children()
                .filter(|n| n.is_element() && n.has_tag_name("Field"))
                .map(raw_field_from_node)
                .collect::<Result<_>>()?;
        }
    }

    Ok(fields)
}

fn raw_field_from_node(node: roxmltree::Node) -> Result<RawField> {
    let name = node
        .attribute("name")
        .ok_or_else(|| Error::malformed("Field element missing 'name' attribute"))?
        .to_string();
    let xml_type = node
        .attribute("type")
        .ok_or_else(|| Error::malformed(format!("field '{name}' missing 'type' attribute")))?
        .to_string();
    let size = node
        .attribute("size")
        .map(|s| s.parse::<i32>())
        .transpose()
        .map_err(|_| Error::malformed(format!("field '{name}' has a non-numeric 'size'")))?
        .unwrap_or(0);
    Ok(RawField {
        name,
        xml_type,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf16_metadata() {
        let text = "<a/>";
        let bytes: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decode_utf16_metadata(&bytes).unwrap(), text);
    }

    #[test]
    fn parses_root_level_fields() {
        let xml = r#"<MetaInfo><Field name="A" type="Int32" size="4"/><Field name="B" type="V_String" size="0"/></MetaInfo>"#;
        let fields = parse_fields(xml).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "A");
        assert_eq!(fields[1].xml_type, "V_String");
    }

    #[test]
    fn falls_back_to_record_info_fields() {
        let xml = r#"<MetaInfo><RecordInfo><Field name="A" type="Byte" size="1"/></RecordInfo></MetaInfo>"#;
        let fields = parse_fields(xml).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "A");
    }
}
