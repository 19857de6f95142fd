//! On-disk record format
//!
//! ```text
//! [magic: u32][body_len: u32]
//! [realtime_usec: u64][monotonic_usec: u64][field_count: u32]
//! ([payload_len: u32][NAME=value])*
//! ```
//!
//! All integers are big-endian.

use logbook_core::{LogbookError, Result};

pub(crate) const RECORD_MAGIC: u32 = 0x4C42_4B31;
pub(crate) const HEADER_LEN: usize = 8;
pub(crate) const FIXED_BODY_LEN: usize = 8 + 8 + 4;

/// One stored entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub realtime_usec: u64,
    pub monotonic_usec: u64,
    pub payloads: Vec<Vec<u8>>,
}

impl Record {
    /// Encode header and body into one buffer
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body_len = FIXED_BODY_LEN
            + self
                .payloads
                .iter()
                .map(|p| 4 + p.len())
                .sum::<usize>();

        if body_len > u32::MAX as usize {
            return Err(LogbookError::Write(format!(
                "record size {} exceeds u32 encoding limit",
                body_len
            )));
        }

        let mut buf = Vec::with_capacity(HEADER_LEN + body_len);
        buf.extend_from_slice(&RECORD_MAGIC.to_be_bytes());
        buf.extend_from_slice(&(body_len as u32).to_be_bytes());
        buf.extend_from_slice(&self.realtime_usec.to_be_bytes());
        buf.extend_from_slice(&self.monotonic_usec.to_be_bytes());
        buf.extend_from_slice(&(self.payloads.len() as u32).to_be_bytes());
        for payload in &self.payloads {
            buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            buf.extend_from_slice(payload);
        }
        Ok(buf)
    }

    /// Decode a record body (everything after the header)
    pub fn decode_body(body: &[u8]) -> Result<Self> {
        let mut reader = BodyReader { buf: body, pos: 0 };
        let realtime_usec = reader.u64()?;
        let monotonic_usec = reader.u64()?;
        let count = reader.u32()? as usize;

        let mut payloads = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let len = reader.u32()? as usize;
            payloads.push(reader.take(len)?.to_vec());
        }

        if reader.pos != body.len() {
            return Err(LogbookError::Read(format!(
                "record body has {} trailing bytes",
                body.len() - reader.pos
            )));
        }

        Ok(Self {
            realtime_usec,
            monotonic_usec,
            payloads,
        })
    }

    /// Payload of the first field named `name`
    pub fn field(&self, name: &str) -> Option<&[u8]> {
        let name = name.as_bytes();
        self.payloads
            .iter()
            .find(|p| p.len() > name.len() && p.starts_with(name) && p[name.len()] == b'=')
            .map(Vec::as_slice)
    }
}

/// Validate a record header and return the body length
pub(crate) fn decode_header(header: &[u8]) -> Result<u64> {
    let mut reader = BodyReader { buf: header, pos: 0 };
    let magic = reader.u32()?;
    if magic != RECORD_MAGIC {
        return Err(LogbookError::Read(format!(
            "bad record magic {:#010x}",
            magic
        )));
    }

    let body_len = reader.u32()? as usize;
    if body_len < FIXED_BODY_LEN {
        return Err(LogbookError::Read(format!(
            "record body length {} is shorter than the fixed header",
            body_len
        )));
    }
    Ok(body_len as u64)
}

pub(crate) fn be_u64(bytes: &[u8]) -> Result<u64> {
    BodyReader { buf: bytes, pos: 0 }.u64()
}

struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                LogbookError::Read(format!("record truncated at byte {}", self.pos))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(raw))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record {
            realtime_usec: 1_700_000_000_000_000,
            monotonic_usec: 42,
            payloads: vec![b"MESSAGE=hello".to_vec(), b"EQ=a=b".to_vec()],
        }
    }

    #[test]
    fn test_encode_layout() {
        let bytes = record().encode().unwrap();
        let body_len = decode_header(&bytes[..HEADER_LEN]).unwrap();
        assert_eq!(bytes.len() as u64, HEADER_LEN as u64 + body_len);

        let decoded = Record::decode_body(&bytes[HEADER_LEN..]).unwrap();
        assert_eq!(decoded, record());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = record().encode().unwrap();
        bytes[0] = 0;
        assert!(matches!(
            decode_header(&bytes[..HEADER_LEN]),
            Err(LogbookError::Read(_))
        ));
    }

    #[test]
    fn test_truncated_body() {
        let bytes = record().encode().unwrap();
        let body = &bytes[HEADER_LEN..bytes.len() - 3];
        assert!(matches!(
            Record::decode_body(body),
            Err(LogbookError::Read(_))
        ));
    }

    #[test]
    fn test_field_lookup_requires_exact_name() {
        let rec = Record {
            realtime_usec: 0,
            monotonic_usec: 0,
            payloads: vec![b"MESSAGE_ID=1".to_vec(), b"MESSAGE=x".to_vec()],
        };
        assert_eq!(rec.field("MESSAGE"), Some(&b"MESSAGE=x"[..]));
        assert_eq!(rec.field("MESSAGE_ID"), Some(&b"MESSAGE_ID=1"[..]));
        assert_eq!(rec.field("MESS"), None);
    }
}
