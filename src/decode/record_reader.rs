//! Pulls LZF-framed blocks from a byte stream and assembles them into
//! individual fixed/variable-length records.

use std::io::Read;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::lzf;

const LZF_BUFFER_SIZE: usize = 262_144;
const UNCOMPRESSED_FLAG: u32 = 0x8000_0000;

/// Lifecycle of a [`RecordReader`]. Mirrors the "no reads after this" rule: once
/// `Exhausted` or `Errored`, every subsequent `next_record` call returns `false`
/// without touching the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InRecord,
    Exhausted,
    Errored,
}

/// Reads one YXDB record at a time out of a compressed, block-framed stream.
///
/// Owns two fixed 256 KiB scratch buffers for LZF input/output and a growable
/// record-assembly buffer. All three are reused across every call to
/// [`RecordReader::next_record`].
pub(crate) struct RecordReader<R> {
    stream: R,
    fixed_len: usize,
    has_var_fields: bool,
    total_records: u64,
    current_record: u64,
    state: State,

    record_buffer: Vec<u8>,
    record_buffer_index: usize,

    lzf_in: Vec<u8>,
    lzf_out: Vec<u8>,
    lzf_out_index: usize,
    lzf_out_size: usize,

    last_error: Option<Error>,
}

impl<R: Read> RecordReader<R> {
    pub fn new(stream: R, fixed_len: usize, has_var_fields: bool, total_records: u64) -> Self {
        let record_buffer = if has_var_fields {
            vec![0u8; fixed_len + 4 + 1000]
        } else {
            vec![0u8; fixed_len]
        };
        debug!(
            "opening record reader: fixed_len={fixed_len} has_var_fields={has_var_fields} total_records={total_records}"
        );
        RecordReader {
            stream,
            fixed_len,
            has_var_fields,
            total_records,
            current_record: 0,
            state: State::Idle,
            record_buffer,
            record_buffer_index: 0,
            lzf_in: vec![0u8; LZF_BUFFER_SIZE],
            lzf_out: vec![0u8; LZF_BUFFER_SIZE],
            lzf_out_index: 0,
            lzf_out_size: 0,
            last_error: None,
        }
    }

    /// The bytes of the most recently assembled record.
    pub fn record(&self) -> &[u8] {
        &self.record_buffer[..self.record_buffer_index]
    }

    /// The cause of the most recent failed `next_record` call, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Advances to the next record. Returns `false` when the declared record
    /// count has been reached or the reader has already failed; in the latter
    /// case, the cause is stashed and retrievable through [`Self::last_error`].
    pub fn next_record(&mut self) -> bool {
        if self.state == State::Exhausted {
            return false;
        }
        if self.state == State::Errored {
            return false;
        }

        self.current_record += 1;
        if self.current_record > self.total_records {
            self.state = State::Exhausted;
            return false;
        }

        self.record_buffer_index = 0;
        let result = if self.has_var_fields {
            self.read_variable_record()
        } else {
            self.read(self.fixed_len)
        };

        match result {
            Ok(()) => {
                self.state = State::InRecord;
                true
            }
            Err(e) => {
                self.state = State::Errored;
                self.last_error = Some(e);
                false
            }
        }
    }

    fn read_variable_record(&mut self) -> Result<()> {
        self.read(self.fixed_len + 4)?;
        let len_at = self.record_buffer_index - 4;
        let var_length = u32::from_le_bytes([
            self.record_buffer[len_at],
            self.record_buffer[len_at + 1],
            self.record_buffer[len_at + 2],
            self.record_buffer[len_at + 3],
        ]) as usize;

        if self.fixed_len + 4 + var_length > self.record_buffer.capacity() {
            let new_length = (self.fixed_len + 4 + var_length) * 2;
            warn!(
                "growing record buffer from {} to {new_length} bytes for a {var_length}-byte variable record",
                self.record_buffer.capacity()
            );
            let mut new_buffer = vec![0u8; new_length];
            let copy_to = self.fixed_len + 4;
            new_buffer[..copy_to].copy_from_slice(&self.record_buffer[..copy_to]);
            self.record_buffer = new_buffer;
        } else if self.record_buffer.len() < self.fixed_len + 4 + var_length {
            self.record_buffer.resize(self.fixed_len + 4 + var_length, 0);
        }

        self.read(var_length)
    }

    fn read(&mut self, mut size: usize) -> Result<()> {
        while size > 0 {
            if self.lzf_out_size == 0 {
                self.lzf_out_size = self.read_next_lzf_block()?;
            }

            while size + self.lzf_out_index > self.lzf_out_size {
                size -= self.copy_remaining_lzf_out_to_record();
                self.lzf_out_size = self.read_next_lzf_block()?;
                self.lzf_out_index = 0;
            }

            let len_to_copy = size.min(self.lzf_out_size - self.lzf_out_index);
            let src = self.lzf_out_index;
            let dst = self.record_buffer_index;
            if self.record_buffer.len() < dst + len_to_copy {
                self.record_buffer.resize(dst + len_to_copy, 0);
            }
            self.record_buffer[dst..dst + len_to_copy]
                .copy_from_slice(&self.lzf_out[src..src + len_to_copy]);
            self.lzf_out_index += len_to_copy;
            self.record_buffer_index += len_to_copy;
            size -= len_to_copy;
        }
        Ok(())
    }

    fn copy_remaining_lzf_out_to_record(&mut self) -> usize {
        let remaining = self.lzf_out_size - self.lzf_out_index;
        let dst = self.record_buffer_index;
        if self.record_buffer.len() < dst + remaining {
            self.record_buffer.resize(dst + remaining, 0);
        }
        self.record_buffer[dst..dst + remaining]
            .copy_from_slice(&self.lzf_out[self.lzf_out_index..self.lzf_out_index + remaining]);
        self.record_buffer_index += remaining;
        remaining
    }

    fn read_next_lzf_block(&mut self) -> Result<usize> {
        let mut block_length = self.read_lzf_block_length()?;
        if block_length & UNCOMPRESSED_FLAG != 0 {
            block_length &= !UNCOMPRESSED_FLAG;
            if block_length as usize > LZF_BUFFER_SIZE {
                return Err(Error::malformed(format!(
                    "uncompressed block of {block_length} bytes exceeds the {LZF_BUFFER_SIZE}-byte buffer"
                )));
            }
            self.stream
                .read_exact(&mut self.lzf_out[..block_length as usize])
                .map_err(|e| Error::io(e, "reading uncompressed lzf block"))?;
            return Ok(block_length as usize);
        }

        if block_length as usize > LZF_BUFFER_SIZE {
            return Err(Error::malformed(format!(
                "compressed block of {block_length} bytes exceeds the {LZF_BUFFER_SIZE}-byte buffer"
            )));
        }
        self.stream
            .read_exact(&mut self.lzf_in[..block_length as usize])
            .map_err(|e| Error::io(e, "reading lzf block"))?;
        lzf::decompress(&self.lzf_in, block_length as usize, &mut self.lzf_out)
    }

    fn read_lzf_block_length(&mut self) -> Result<u32> {
        let mut length_buffer = [0u8; 4];
        self.stream
            .read_exact(&mut length_buffer)
            .map_err(|_| Error::malformed("yxdb file is not valid: truncated block length"))?;
        Ok(u32::from_le_bytes(length_buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lzf_block(bytes: &[u8]) -> Vec<u8> {
        let mut framed = ((bytes.len() as u32) | UNCOMPRESSED_FLAG).to_le_bytes().to_vec();
        framed.extend_from_slice(bytes);
        framed
    }

    #[test]
    fn reads_fixed_records_across_block_boundary() {
        let mut body = lzf_block(&[1, 2, 3]);
        body.extend(lzf_block(&[4, 5, 6]));
        let mut reader = RecordReader::new(Cursor::new(body), 3, false, 2);
        assert!(reader.next_record());
        assert_eq!(reader.record(), &[1, 2, 3]);
        assert!(reader.next_record());
        assert_eq!(reader.record(), &[4, 5, 6]);
        assert!(!reader.next_record());
    }

    #[test]
    fn reads_variable_record_and_grows_buffer() {
        // fixed_len = 2, var length = 5 encoded as u32 LE right after the fixed bytes
        let mut payload = vec![9u8, 9];
        payload.extend_from_slice(&5u32.to_le_bytes());
        payload.extend_from_slice(b"hello");
        let body = lzf_block(&payload);
        let mut reader = RecordReader::new(Cursor::new(body), 2, true, 1);
        assert!(reader.next_record());
        assert_eq!(reader.record(), payload.as_slice());
    }

    #[test]
    fn stops_at_declared_record_count() {
        let body = lzf_block(&[1, 2, 3, 4, 5, 6]);
        let mut reader = RecordReader::new(Cursor::new(body), 3, false, 1);
        assert!(reader.next_record());
        assert!(!reader.next_record());
    }

    #[test]
    fn truncated_block_length_is_malformed() {
        let body = vec![0u8, 1];
        let mut reader = RecordReader::new(Cursor::new(body), 3, false, 1);
        assert!(!reader.next_record());
        assert!(matches!(reader.last_error(), Some(Error::MalformedFile(_))));
    }
}
