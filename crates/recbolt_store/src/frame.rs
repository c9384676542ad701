//! Commit log framing.
//!
//! Every committed write transaction becomes one frame:
//!
//! ```text
//! ┌───────────┬─────────────┬────────────┬────────────────┬────────────────────┬───────────┐
//! │ Magic (4) │ Version (2) │ Length (4) │ Header CRC (4) │ Payload (variable) │ CRC32 (4) │
//! └───────────┴─────────────┴────────────┴────────────────┴────────────────────┴───────────┘
//! ```
//!
//! The payload is a list of [`Op`]s, each a one byte tag followed by
//! length-prefixed byte strings. All integers are little-endian. The header
//! CRC covers magic, version and length; the trailing CRC covers every byte
//! before it.
//!
//! Only a frame that runs past the end of the log with an intact header is a
//! torn tail. A damaged length field fails the header CRC instead of being
//! mistaken for one.

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};
use crc32fast::Hasher;

/// Magic bytes identifying a commit frame.
pub const FRAME_MAGIC: [u8; 4] = *b"RBLT";

/// Current frame format version.
pub const FRAME_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
const PREFIX_SIZE: usize = 10;

/// prefix + header CRC (4)
const HEADER_SIZE: usize = PREFIX_SIZE + 4;

const CRC_SIZE: usize = 4;

const TAG_CREATE_BUCKET: u8 = 1;
const TAG_PUT: u8 = 2;

/// A single logged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Create a bucket if it does not exist yet.
    CreateBucket {
        /// Bucket name.
        bucket: Vec<u8>,
    },
    /// Insert or overwrite a key in a bucket.
    Put {
        /// Bucket name.
        bucket: Vec<u8>,
        /// Entry key.
        key: Vec<u8>,
        /// Entry value.
        value: Vec<u8>,
    },
}

fn put_bytes(buf: &mut Vec<u8>, what: &'static str, bytes: &[u8]) -> StoreResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| StoreError::TooLarge {
        what,
        len: bytes.len(),
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Encodes a list of operations as a complete frame.
pub fn encode_frame(ops: &[Op]) -> StoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    for op in ops {
        match op {
            Op::CreateBucket { bucket } => {
                payload.push(TAG_CREATE_BUCKET);
                put_bytes(&mut payload, "bucket name", bucket)?;
            }
            Op::Put { bucket, key, value } => {
                payload.push(TAG_PUT);
                put_bytes(&mut payload, "bucket name", bucket)?;
                put_bytes(&mut payload, "key", key)?;
                put_bytes(&mut payload, "value", value)?;
            }
        }
    }

    let len = u32::try_from(payload.len()).map_err(|_| StoreError::TooLarge {
        what: "transaction",
        len: payload.len(),
    })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&FRAME_MAGIC);
    frame.extend_from_slice(&FRAME_VERSION.to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32(&frame).to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&crc32(&frame).to_le_bytes());

    Ok(frame)
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Decodes the operations of a frame payload.
pub fn decode_payload(payload: &[u8]) -> StoreResult<Vec<Op>> {
    let mut cursor = 0usize;
    let mut ops = Vec::new();

    let read_bytes = |cursor: &mut usize| -> StoreResult<Vec<u8>> {
        let header = payload
            .get(*cursor..*cursor + 4)
            .ok_or_else(|| StoreError::corrupted("unexpected end of frame payload"))?;
        let len = read_u32(header) as usize;
        *cursor += 4;
        let bytes = payload
            .get(*cursor..*cursor + len)
            .ok_or_else(|| StoreError::corrupted("byte string overruns frame payload"))?;
        *cursor += len;
        Ok(bytes.to_vec())
    };

    while cursor < payload.len() {
        let tag = payload[cursor];
        cursor += 1;
        match tag {
            TAG_CREATE_BUCKET => {
                let bucket = read_bytes(&mut cursor)?;
                ops.push(Op::CreateBucket { bucket });
            }
            TAG_PUT => {
                let bucket = read_bytes(&mut cursor)?;
                let key = read_bytes(&mut cursor)?;
                let value = read_bytes(&mut cursor)?;
                ops.push(Op::Put { bucket, key, value });
            }
            other => {
                return Err(StoreError::corrupted(format!("unknown op tag {other}")));
            }
        }
    }

    Ok(ops)
}

/// Result of scanning a commit log.
#[derive(Debug, Default)]
pub struct Replay {
    /// Operations of every intact frame, in log order.
    pub frames: Vec<Vec<Op>>,
    /// Offset just past the last intact frame.
    pub valid_len: u64,
    /// Whether bytes after `valid_len` belong to a torn frame.
    pub torn_tail: bool,
}

/// Reads every frame from `backend`.
///
/// A trailing frame whose header is cut short, or whose intact header
/// announces a body that runs past the end of the log, is a torn tail and
/// ends the log. Bad magic, an unknown version or a checksum mismatch in
/// the header or in a complete frame is corruption.
pub fn replay(backend: &dyn StorageBackend) -> StoreResult<Replay> {
    let size = backend.size()?;
    let mut offset = 0u64;
    let mut replay = Replay::default();

    while offset < size {
        let remaining = size - offset;
        if remaining < HEADER_SIZE as u64 {
            replay.torn_tail = true;
            break;
        }

        let header = backend.read_at(offset, HEADER_SIZE)?;
        if header[0..4] != FRAME_MAGIC {
            return Err(StoreError::corrupted(format!(
                "bad frame magic at offset {offset}"
            )));
        }
        let stored = read_u32(&header[PREFIX_SIZE..]);
        let computed = crc32(&header[..PREFIX_SIZE]);
        if stored != computed {
            return Err(StoreError::corrupted(format!(
                "header checksum mismatch at offset {offset}: expected {stored:08x}, got {computed:08x}"
            )));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != FRAME_VERSION {
            return Err(StoreError::corrupted(format!(
                "unsupported frame version {version} at offset {offset}"
            )));
        }
        let len = u64::from(read_u32(&header[6..PREFIX_SIZE]));

        let frame_len = HEADER_SIZE as u64 + len + CRC_SIZE as u64;
        if frame_len > remaining {
            replay.torn_tail = true;
            break;
        }

        let frame = backend.read_at(offset, frame_len as usize)?;
        let (body, crc_bytes) = frame.split_at(frame.len() - CRC_SIZE);
        let stored = read_u32(crc_bytes);
        let computed = crc32(body);
        if stored != computed {
            return Err(StoreError::corrupted(format!(
                "checksum mismatch at offset {offset}: expected {stored:08x}, got {computed:08x}"
            )));
        }

        replay.frames.push(decode_payload(&body[HEADER_SIZE..])?);
        offset += frame_len;
        replay.valid_len = offset;
    }

    Ok(replay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    fn sample_ops() -> Vec<Op> {
        vec![
            Op::CreateBucket {
                bucket: b"Widget".to_vec(),
            },
            Op::Put {
                bucket: b"Widget".to_vec(),
                key: b"k1".to_vec(),
                value: b"v1".to_vec(),
            },
        ]
    }

    #[test]
    fn replay_reads_frames_in_order() {
        let mut backend = InMemoryBackend::new();
        backend.append(&encode_frame(&sample_ops()).unwrap()).unwrap();
        backend.append(&encode_frame(&[]).unwrap()).unwrap();

        let replay = replay(&backend).unwrap();
        assert_eq!(replay.frames.len(), 2);
        assert_eq!(replay.frames[0], sample_ops());
        assert!(replay.frames[1].is_empty());
        assert_eq!(replay.valid_len, backend.size().unwrap());
        assert!(!replay.torn_tail);
    }

    #[test]
    fn torn_tail_ends_the_log() {
        let frame = encode_frame(&sample_ops()).unwrap();
        let mut bytes = frame.clone();
        bytes.extend_from_slice(&frame[..frame.len() - 3]);
        let backend = InMemoryBackend::with_data(bytes);

        let replay = replay(&backend).unwrap();
        assert_eq!(replay.frames.len(), 1);
        assert_eq!(replay.valid_len, frame.len() as u64);
        assert!(replay.torn_tail);
    }

    #[test]
    fn flipped_bit_is_corruption() {
        let mut bytes = encode_frame(&sample_ops()).unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0x01;
        let backend = InMemoryBackend::with_data(bytes);

        assert!(matches!(replay(&backend), Err(StoreError::Corrupted(_))));
    }

    #[test]
    fn damaged_length_is_corruption_not_a_torn_tail() {
        let mut bytes = encode_frame(&sample_ops()).unwrap();
        bytes.extend_from_slice(&encode_frame(&sample_ops()).unwrap());
        bytes[9] = 0x7f;
        let backend = InMemoryBackend::with_data(bytes);

        assert!(matches!(replay(&backend), Err(StoreError::Corrupted(_))));
    }

    #[test]
    fn short_header_is_a_torn_tail() {
        let frame = encode_frame(&sample_ops()).unwrap();
        let mut bytes = frame.clone();
        bytes.extend_from_slice(&frame[..HEADER_SIZE - 1]);
        let backend = InMemoryBackend::with_data(bytes);

        let replay = replay(&backend).unwrap();
        assert_eq!(replay.frames.len(), 1);
        assert_eq!(replay.valid_len, frame.len() as u64);
        assert!(replay.torn_tail);
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = encode_frame(&sample_ops()).unwrap();
        bytes[0] = b'X';
        let backend = InMemoryBackend::with_data(bytes);

        assert!(matches!(replay(&backend), Err(StoreError::Corrupted(_))));
    }
}
