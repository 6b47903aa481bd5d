//! Log record framing.
//!
//! Every committed write transaction becomes exactly one record:
//!
//! ```text
//! magic "BSOL" (4) | version u16 (2) | payload length u32 (4) | CBOR payload | crc32 (4)
//! ```
//!
//! All integers are little-endian. The CRC covers everything before it. A
//! record that is short or fails its CRC was never committed.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a log record.
pub const LOG_MAGIC: [u8; 4] = *b"BSOL";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

const HEADER_SIZE: usize = 10;
const CRC_SIZE: usize = 4;

/// One logged mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOp {
    /// Create a namespace if it does not exist.
    CreateNamespace {
        /// Namespace name.
        name: String,
    },
    /// Remove a namespace and all of its entries.
    DropNamespace {
        /// Namespace name.
        name: String,
    },
    /// Insert or replace an entry.
    Put {
        /// Namespace name.
        namespace: String,
        /// Entry key.
        key: String,
        /// Encoded value.
        value: Vec<u8>,
    },
    /// Remove an entry.
    Delete {
        /// Namespace name.
        namespace: String,
        /// Entry key.
        key: String,
    },
}

/// Frames a transaction's operations as one record.
pub fn encode_record(ops: &[LogOp]) -> StoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(ops, &mut payload).map_err(|e| StoreError::Encoding(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::Encoding("log record payload too large".into()))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    data.extend_from_slice(&LOG_VERSION.to_le_bytes());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);

    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Result of scanning a raw log.
#[derive(Debug, Default)]
pub struct DecodedLog {
    /// Operations of each valid record, in commit order.
    pub records: Vec<Vec<LogOp>>,
    /// Length of the valid prefix in bytes.
    pub valid_len: u64,
    /// Why scanning stopped early, if it did.
    pub tail_error: Option<String>,
}

/// Decodes records until the end of `bytes` or the first invalid record.
pub fn decode_log(bytes: &[u8]) -> DecodedLog {
    let mut log = DecodedLog::default();
    let mut offset = 0usize;

    while offset < bytes.len() {
        match decode_one(&bytes[offset..]) {
            Ok((ops, consumed)) => {
                log.records.push(ops);
                offset += consumed;
                log.valid_len = offset as u64;
            }
            Err(reason) => {
                log.tail_error = Some(format!("at offset {offset}: {reason}"));
                break;
            }
        }
    }
    log
}

fn decode_one(bytes: &[u8]) -> Result<(Vec<LogOp>, usize), String> {
    if bytes.len() < HEADER_SIZE + CRC_SIZE {
        return Err("truncated record header".into());
    }
    if bytes[0..4] != LOG_MAGIC {
        return Err("bad magic".into());
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != LOG_VERSION {
        return Err(format!("unsupported log version {version}"));
    }
    let len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
    let total = HEADER_SIZE + len + CRC_SIZE;
    if bytes.len() < total {
        return Err("truncated record payload".into());
    }

    let body_end = HEADER_SIZE + len;
    let stored = u32::from_le_bytes([
        bytes[body_end],
        bytes[body_end + 1],
        bytes[body_end + 2],
        bytes[body_end + 3],
    ]);
    let computed = compute_crc32(&bytes[..body_end]);
    if stored != computed {
        return Err(format!(
            "checksum mismatch: expected {stored:08x}, got {computed:08x}"
        ));
    }

    let ops: Vec<LogOp> = ciborium::from_reader(&bytes[HEADER_SIZE..body_end])
        .map_err(|e| format!("undecodable payload: {e}"))?;
    Ok((ops, total))
}

/// CRC32 (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ops() -> Vec<LogOp> {
        vec![
            LogOp::CreateNamespace {
                name: "tabs".into(),
            },
            LogOp::Put {
                namespace: "tabs".into(),
                key: "a".into(),
                value: vec![1, 2, 3],
            },
        ]
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn records_decode_in_order() {
        let mut bytes = encode_record(&sample_ops()).unwrap();
        bytes.extend(
            encode_record(&[LogOp::DropNamespace {
                name: "tabs".into(),
            }])
            .unwrap(),
        );

        let log = decode_log(&bytes);
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.records[0], sample_ops());
        assert_eq!(log.valid_len, bytes.len() as u64);
        assert!(log.tail_error.is_none());
    }

    #[test]
    fn torn_tail_is_excluded() {
        let first = encode_record(&sample_ops()).unwrap();
        let second = encode_record(&sample_ops()).unwrap();
        let mut bytes = first.clone();
        bytes.extend_from_slice(&second[..second.len() - 3]);

        let log = decode_log(&bytes);
        assert_eq!(log.records.len(), 1);
        assert_eq!(log.valid_len, first.len() as u64);
        assert!(log.tail_error.is_some());
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut bytes = encode_record(&sample_ops()).unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xFF;

        let log = decode_log(&bytes);
        assert!(log.records.is_empty());
        assert_eq!(log.valid_len, 0);
    }
}
