//! Newline record framing for inbound traffic.
//!
//! [`RecordCodec`] splits a byte stream on `\n` (tolerating `\r\n`) and
//! yields raw record bytes. UTF-8 and JSON validation happen later, per
//! record, so a bad record never poisons the stream. A record longer than
//! the configured limit is a framing error and ends the connection.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::error::RelayError;

/// Decoder for newline-delimited records with a length cap.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    max_length: usize,
    /// Bytes already scanned for a newline in the current buffer.
    next_index: usize,
}

impl RecordCodec {
    /// Creates a codec that rejects records longer than `max_length` bytes
    /// (excluding the delimiter).
    #[must_use]
    pub const fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    /// Returns the configured record length limit.
    #[must_use]
    pub const fn max_length(&self) -> usize {
        self.max_length
    }

    fn too_long(&mut self) -> RelayError {
        self.next_index = 0;
        RelayError::RecordTooLong {
            limit: self.max_length,
        }
    }
}

fn strip_carriage_return(record: &mut BytesMut) {
    if record.last() == Some(&b'\r') {
        record.truncate(record.len().saturating_sub(1));
    }
}

impl Decoder for RecordCodec {
    type Item = BytesMut;
    type Error = RelayError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let start = self.next_index.min(buf.len());
        let newline = buf
            .get(start..)
            .and_then(|tail| tail.iter().position(|b| *b == b'\n'));

        let Some(offset) = newline else {
            if buf.len() > self.max_length {
                return Err(self.too_long());
            }
            self.next_index = buf.len();
            return Ok(None);
        };

        let end = start.saturating_add(offset);
        if end > self.max_length {
            return Err(self.too_long());
        }
        self.next_index = 0;
        let mut record = buf.split_to(end.saturating_add(1));
        record.truncate(end);
        strip_carriage_return(&mut record);
        Ok(Some(record))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(record) = self.decode(buf)? {
            return Ok(Some(record));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // Final record without a trailing delimiter.
        self.next_index = 0;
        let mut record = buf.split();
        strip_carriage_return(&mut record);
        Ok(Some(record))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut RecordCodec, input: &[u8]) -> Vec<Vec<u8>> {
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(record)) => out.push(record.to_vec()),
                Ok(None) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        out
    }

    #[test]
    fn splits_on_newline() {
        let mut codec = RecordCodec::new(64);
        let records = decode_all(&mut codec, b"{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(records, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
    }

    #[test]
    fn strips_carriage_return() {
        let mut codec = RecordCodec::new(64);
        let records = decode_all(&mut codec, b"ping\r\n");
        assert_eq!(records, vec![b"ping".to_vec()]);
    }

    #[test]
    fn partial_record_waits_for_more_bytes() {
        let mut codec = RecordCodec::new(64);
        let mut buf = BytesMut::from(b"{\"type\":".as_slice());
        assert!(matches!(codec.decode(&mut buf), Ok(None)));

        buf.extend_from_slice(b"\"ping\"}\n");
        let Ok(Some(record)) = codec.decode(&mut buf) else {
            panic!("expected a record");
        };
        assert_eq!(&*record, b"{\"type\":\"ping\"}");
        assert!(buf.is_empty());
    }

    #[test]
    fn invalid_utf8_is_passed_through() {
        let mut codec = RecordCodec::new(64);
        let records = decode_all(&mut codec, b"\xff\xfe\nok\n");
        assert_eq!(records, vec![vec![0xff, 0xfe], b"ok".to_vec()]);
    }

    #[test]
    fn oversized_record_is_rejected() {
        let mut codec = RecordCodec::new(4);
        let mut buf = BytesMut::from(b"123456\n".as_slice());
        assert!(matches!(
            codec.decode(&mut buf),
            Err(RelayError::RecordTooLong { limit: 4 })
        ));
    }

    #[test]
    fn oversized_partial_record_is_rejected_early() {
        let mut codec = RecordCodec::new(4);
        let mut buf = BytesMut::from(b"123456".as_slice());
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn record_at_limit_is_accepted() {
        let mut codec = RecordCodec::new(4);
        let records = decode_all(&mut codec, b"1234\n");
        assert_eq!(records, vec![b"1234".to_vec()]);
        assert_eq!(codec.max_length(), 4);
    }

    #[test]
    fn eof_flushes_trailing_record() {
        let mut codec = RecordCodec::new(64);
        let mut buf = BytesMut::from(b"last".as_slice());
        let Ok(Some(record)) = codec.decode_eof(&mut buf) else {
            panic!("expected trailing record");
        };
        assert_eq!(&*record, b"last");
        assert!(matches!(codec.decode_eof(&mut buf), Ok(None)));
    }
}
