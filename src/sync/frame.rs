//! Sync channel framing
//!
//! Frame format: [MAGIC:4][LEN:4][PAYLOAD:LEN][CRC32:4]
//!
//! The payload is the bincode encoding of a [`ProspectBatch`]; the checksum
//! covers the length and the payload. All integers are little-endian.

use crate::common::{codec, crc32, Error, Result};
use crate::sync::message::ProspectBatch;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const FRAME_MAGIC: [u8; 4] = [0x50, 0x54, 0x42, 0x31]; // "PTB1"
const HEADER_LEN: usize = 8;
const TRAILER_LEN: usize = 4;

/// Upper bound on a single frame payload.
pub const MAX_FRAME_PAYLOAD: usize = 16 * 1024 * 1024;

fn checksum(len_bytes: &[u8; 4], payload: &[u8]) -> u32 {
    let mut checksum_data = Vec::with_capacity(4 + payload.len());
    checksum_data.extend_from_slice(len_bytes);
    checksum_data.extend_from_slice(payload);
    crc32(&checksum_data)
}

/// Encode a batch into one frame.
pub fn encode_frame(batch: &ProspectBatch) -> Result<Vec<u8>> {
    let payload = codec::encode(batch)?;
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(Error::Frame(format!(
            "batch of {} record(s) encodes to {} bytes, limit is {}",
            batch.len(),
            payload.len(),
            MAX_FRAME_PAYLOAD
        )));
    }

    let len_bytes = (payload.len() as u32).to_le_bytes();
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    frame.extend_from_slice(&FRAME_MAGIC);
    frame.extend_from_slice(&len_bytes);
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&checksum(&len_bytes, &payload).to_le_bytes());
    Ok(frame)
}

/// Decode one complete frame held in memory.
pub fn decode_frame(frame: &[u8]) -> Result<ProspectBatch> {
    if frame.len() < HEADER_LEN + TRAILER_LEN {
        return Err(Error::Frame(format!("frame too short: {} bytes", frame.len())));
    }
    let header: [u8; HEADER_LEN] = frame[..HEADER_LEN]
        .try_into()
        .map_err(|_| Error::Frame("bad header".into()))?;
    let len = parse_header(&header)?;
    if frame.len() != HEADER_LEN + len + TRAILER_LEN {
        return Err(Error::Frame(format!(
            "frame length {} does not match header length {}",
            frame.len(),
            len
        )));
    }
    let payload = &frame[HEADER_LEN..HEADER_LEN + len];
    let mut trailer = [0u8; TRAILER_LEN];
    trailer.copy_from_slice(&frame[HEADER_LEN + len..]);
    verify_and_decode(&header, payload, trailer)
}

fn parse_header(header: &[u8; HEADER_LEN]) -> Result<usize> {
    if header[..4] != FRAME_MAGIC {
        return Err(Error::Frame("invalid frame magic".into()));
    }
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if len > MAX_FRAME_PAYLOAD {
        return Err(Error::Frame(format!(
            "frame payload of {} bytes exceeds limit {}",
            len, MAX_FRAME_PAYLOAD
        )));
    }
    Ok(len)
}

fn verify_and_decode(
    header: &[u8; HEADER_LEN],
    payload: &[u8],
    trailer: [u8; TRAILER_LEN],
) -> Result<ProspectBatch> {
    let len_bytes = [header[4], header[5], header[6], header[7]];
    let stored = u32::from_le_bytes(trailer);
    let computed = checksum(&len_bytes, payload);
    if stored != computed {
        return Err(Error::Frame(format!(
            "checksum mismatch: expected {:08x}, got {:08x}",
            stored, computed
        )));
    }
    codec::decode(payload)
}

/// Read the next frame. `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<ProspectBatch>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = parse_header(&header)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    let mut trailer = [0u8; TRAILER_LEN];
    reader.read_exact(&mut trailer).await?;

    verify_and_decode(&header, &payload, trailer).map(Some)
}

/// Write a pre-encoded frame and flush it.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ChunkCoordinate, OreOccurrence, ProspectRecord, RelativeDensity};

    fn sample_batch() -> ProspectBatch {
        ProspectBatch::discovery(vec![ProspectRecord::new(
            ChunkCoordinate::new(10, -4),
            vec![OreOccurrence::new(
                "game:ore-gold",
                "handbook-gold",
                RelativeDensity::UltraHigh,
                41.2,
            )],
        )])
    }

    #[test]
    fn test_frame_decodes_to_same_batch() {
        let batch = sample_batch();
        let frame = encode_frame(&batch).unwrap();
        assert_eq!(&frame[..4], b"PTB1");
        assert_eq!(decode_frame(&frame).unwrap(), batch);
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let mut frame = encode_frame(&sample_batch()).unwrap();
        let mid = frame.len() / 2;
        frame[mid] ^= 0xFF;
        let err = decode_frame(&frame).unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_bad_magic_and_length_rejected() {
        let mut frame = encode_frame(&sample_batch()).unwrap();
        assert!(decode_frame(&frame[..frame.len() - 1]).is_err());
        frame[0] = b'X';
        assert!(decode_frame(&frame).is_err());
    }

    #[tokio::test]
    async fn test_stream_reads_consecutive_frames() {
        let first = sample_batch();
        let second = ProspectBatch::shared(vec![ProspectRecord::unparsed(
            ChunkCoordinate::new(0, 0),
            "raw",
        )]);

        let mut bytes = encode_frame(&first).unwrap();
        bytes.extend(encode_frame(&second).unwrap());
        let mut reader = &bytes[..];

        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(first));
        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(second));
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    /// Frame a one-record batch whose density bypasses sanitizing.
    fn frame_with_density(absolute_density: f64) -> Vec<u8> {
        // ProspectBatch { records: [{ chunk, values, message }], from_discovery }
        let batch = (
            vec![(
                (0i32, 0i32),
                Some(vec![(
                    "game:ore-lead".to_string(),
                    String::new(),
                    RelativeDensity::Poor.ordinal(),
                    absolute_density,
                )]),
                None::<String>,
            )],
            false,
        );
        let payload = codec::encode(&batch).unwrap();
        let len_bytes = (payload.len() as u32).to_le_bytes();
        let mut frame = FRAME_MAGIC.to_vec();
        frame.extend_from_slice(&len_bytes);
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&checksum(&len_bytes, &payload).to_le_bytes());
        frame
    }

    #[test]
    fn test_non_finite_density_frame_rejected() {
        assert_eq!(decode_frame(&frame_with_density(2.0)).unwrap().len(), 1);
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = decode_frame(&frame_with_density(bad)).unwrap_err();
            assert!(matches!(err, Error::Encoding(_)));
            assert!(err.is_recoverable());
        }
    }

    #[tokio::test]
    async fn test_negative_density_frame_is_clamped() {
        let bytes = frame_with_density(-1.0);
        let mut reader = &bytes[..];
        let batch = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(batch.records[0].values().unwrap()[0].absolute_density, 0.0);
    }

    #[tokio::test]
    async fn test_oversized_header_rejected_before_allocation() {
        let mut bytes = FRAME_MAGIC.to_vec();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let mut reader = &bytes[..];
        assert!(matches!(read_frame(&mut reader).await, Err(Error::Frame(_))));
    }
}
