//! The top-level [`Reader`] façade: opens a YXDB byte source, parses its header
//! and metadata, compiles the schema, and exposes a pull cursor over records.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::decode::record_reader::RecordReader;
use crate::error::{Error, Result};
use crate::metadata::{self, Field};
use crate::schema::Schema;

const HEADER_SIZE: usize = 512;
const META_LENGTH_OFFSET: usize = 80;
const RECORD_COUNT_OFFSET: usize = 104;

/// Reads records out of a YXDB file or stream.
///
/// Construct with [`Reader::open_path`] or [`Reader::open`]. Call [`Reader::next`]
/// to advance to each record in turn, then pull typed field values out of it with
/// the `read_*` methods.
pub struct Reader<R> {
    schema: Schema,
    record_reader: RecordReader<R>,
    num_records: u64,
    meta_info_str: String,
}

impl Reader<BufReader<File>> {
    /// Opens a YXDB file at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let file =
            File::open(path.as_ref()).map_err(|e| Error::io(e, "opening yxdb file"))?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read> Reader<R> {
    /// Opens a YXDB reader over any byte stream.
    pub fn open(mut stream: R) -> Result<Self> {
        let header = read_header(&mut stream)?;
        let num_records = u64::from_le_bytes(
            header[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 8]
                .try_into()
                .unwrap(),
        );
        let meta_len_units = u32::from_le_bytes(
            header[META_LENGTH_OFFSET..META_LENGTH_OFFSET + 4]
                .try_into()
                .unwrap(),
        ) as usize;

        let meta_info_str = read_meta_info(&mut stream, meta_len_units)?;
        let raw_fields = metadata::parse_fields(&meta_info_str)?;
        let schema = Schema::from_field_list(&raw_fields)?;
        debug!(
            "opened yxdb reader: {} fields, fixed_size={}, has_var={}, num_records={num_records}",
            schema.fields.len(),
            schema.fixed_size,
            schema.has_var
        );

        let record_reader =
            RecordReader::new(stream, schema.fixed_size, schema.has_var, num_records);

        Ok(Reader {
            schema,
            record_reader,
            num_records,
            meta_info_str,
        })
    }

    /// The fields declared by the file's metadata, in declaration order.
    pub fn list_fields(&self) -> &[Field] {
        &self.schema.fields
    }

    /// The total record count declared by the file's header.
    pub fn num_records(&self) -> u64 {
        self.num_records
    }

    /// The verbatim metadata XML, decoded from UTF-16LE.
    pub fn meta_info_string(&self) -> &str {
        &self.meta_info_str
    }

    /// Advances to the next record. Returns `false` once all records have been
    /// read or a read fails; subsequent calls keep returning `false`. On a
    /// failed read, the cause is retrievable through [`Reader::last_error`].
    pub fn next(&mut self) -> bool {
        self.record_reader.next_record()
    }

    /// The cause of the most recent failed [`Reader::next`] call, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.record_reader.last_error()
    }

    /// Consumes the reader, closing the underlying stream.
    pub fn close(self) {
        drop(self);
    }

    /// The raw bytes of the most recently decoded record.
    pub fn record_bytes(&self) -> &[u8] {
        self.record_reader.record()
    }

    /// Reads a `Bool` field by index, returning `(value, is_null)`.
    ///
    /// Fails if the field at `index` isn't a boolean field.
    pub fn read_bool(&self, index: usize) -> Result<(bool, bool)> {
        self.schema.extract_bool(index, self.record_reader.record())
    }

    pub fn read_bool_by_name(&self, name: &str) -> Result<(bool, bool)> {
        self.schema
            .extract_bool_by_name(name, self.record_reader.record())
    }

    pub fn read_byte(&self, index: usize) -> Result<(u8, bool)> {
        self.schema.extract_byte(index, self.record_reader.record())
    }

    pub fn read_byte_by_name(&self, name: &str) -> Result<(u8, bool)> {
        self.schema
            .extract_byte_by_name(name, self.record_reader.record())
    }

    /// Reads an `Int16`/`Int32`/`Int64` field by index, widened to `i64`.
    pub fn read_int64(&self, index: usize) -> Result<(i64, bool)> {
        self.schema
            .extract_int64(index, self.record_reader.record())
    }

    pub fn read_int64_by_name(&self, name: &str) -> Result<(i64, bool)> {
        self.schema
            .extract_int64_by_name(name, self.record_reader.record())
    }

    pub fn read_float64(&self, index: usize) -> Result<(f64, bool)> {
        self.schema
            .extract_float64(index, self.record_reader.record())
    }

    pub fn read_float64_by_name(&self, name: &str) -> Result<(f64, bool)> {
        self.schema
            .extract_float64_by_name(name, self.record_reader.record())
    }

    pub fn read_string(&self, index: usize) -> Result<(String, bool)> {
        self.schema
            .extract_string(index, self.record_reader.record())
    }

    pub fn read_string_by_name(&self, name: &str) -> Result<(String, bool)> {
        self.schema
            .extract_string_by_name(name, self.record_reader.record())
    }

    pub fn read_time(&self, index: usize) -> Result<(time::PrimitiveDateTime, bool)> {
        self.schema.extract_time(index, self.record_reader.record())
    }

    pub fn read_time_by_name(&self, name: &str) -> Result<(time::PrimitiveDateTime, bool)> {
        self.schema
            .extract_time_by_name(name, self.record_reader.record())
    }

    /// Reads a `Blob`/`SpatialObj` field by index. `Ok(None)` means the value is
    /// null; `Ok(Some(&[]))` means it's an explicit empty value.
    pub fn read_blob(&self, index: usize) -> Result<Option<&[u8]>> {
        self.schema.extract_blob(index, self.record_reader.record())
    }

    pub fn read_blob_by_name(&self, name: &str) -> Result<Option<&[u8]>> {
        self.schema
            .extract_blob_by_name(name, self.record_reader.record())
    }
}

fn read_header<R: Read>(stream: &mut R) -> Result<[u8; HEADER_SIZE]> {
    let mut header = [0u8; HEADER_SIZE];
    stream
        .read_exact(&mut header)
        .map_err(|_| Error::malformed("file is shorter than the 512-byte header"))?;
    Ok(header)
}

fn read_meta_info<R: Read>(stream: &mut R, meta_len_units: usize) -> Result<String> {
    let byte_len = meta_len_units * 2;
    let mut bytes = vec![0u8; byte_len];
    stream
        .read_exact(&mut bytes)
        .map_err(|_| Error::malformed("not enough bytes read from meta-info"))?;
    // trailing 2 bytes are the UTF-16 NUL terminator
    let trimmed = if byte_len >= 2 {
        &bytes[..byte_len - 2]
    } else {
        &bytes[..]
    };
    metadata::decode_utf16_metadata(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn build_file(xml: &str, num_records: u64, body: Vec<u8>) -> Vec<u8> {
        let mut meta = utf16le(xml);
        meta.extend_from_slice(&[0, 0]); // NUL terminator
        let meta_len_units = (meta.len() / 2) as u32;

        let mut header = vec![0u8; HEADER_SIZE];
        header[META_LENGTH_OFFSET..META_LENGTH_OFFSET + 4]
            .copy_from_slice(&meta_len_units.to_le_bytes());
        header[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 8]
            .copy_from_slice(&num_records.to_le_bytes());

        let mut file = header;
        file.extend_from_slice(&meta);
        file.extend_from_slice(&body);
        file
    }

    fn uncompressed_block(bytes: &[u8]) -> Vec<u8> {
        let mut framed = ((bytes.len() as u32) | 0x8000_0000).to_le_bytes().to_vec();
        framed.extend_from_slice(bytes);
        framed
    }

    #[test]
    fn opens_and_reads_a_single_int_record() {
        let xml = r#"<MetaInfo><RecordInfo><Field name="A" type="Int32" size="4"/></RecordInfo></MetaInfo>"#;
        let body = uncompressed_block(&[10, 0, 0, 0, 0]);
        let file = build_file(xml, 1, body);

        let mut reader = Reader::open(Cursor::new(file)).unwrap();
        assert_eq!(reader.list_fields().len(), 1);
        assert_eq!(reader.num_records(), 1);
        assert!(reader.next());
        assert_eq!(reader.read_int64(0).unwrap(), (10, false));
        assert!(!reader.next());
        assert!(reader.last_error().is_none());
        reader.close();
    }

    #[test]
    fn rejects_short_header() {
        let file = vec![0u8; 10];
        assert!(Reader::open(Cursor::new(file)).is_err());
    }
}
