//! Framing: length-prefix (4 bytes LE) + encoded envelope.

use crate::codec::MAX_ENVELOPE_LEN;

/// Size of the length prefix in front of every frame.
pub const LEN_SIZE: usize = 4;
const MAX_FRAME_LEN: u32 = MAX_ENVELOPE_LEN as u32 + 1; // discriminant + body

/// Wrap an encoded envelope into a single frame: 4 bytes LE length + payload.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameEncodeError> {
    if payload.len() > MAX_FRAME_LEN as usize {
        return Err(FrameEncodeError::TooLarge);
    }
    let len = payload.len() as u32;
    let mut out = Vec::with_capacity(LEN_SIZE + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Error wrapping a payload into a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("frame too large")]
    TooLarge,
}

/// Split one frame from the front of `bytes`. Returns the payload and the number of bytes consumed.
/// Call with partial buffer; returns error if not enough bytes (caller should try again after more data).
pub fn decode_frame(bytes: &[u8]) -> Result<(&[u8], usize), FrameDecodeError> {
    if bytes.len() < LEN_SIZE {
        return Err(FrameDecodeError::NeedMore);
    }
    let len = frame_len(&[bytes[0], bytes[1], bytes[2], bytes[3]])?;
    if bytes.len() < LEN_SIZE + len {
        return Err(FrameDecodeError::NeedMore);
    }
    Ok((&bytes[LEN_SIZE..LEN_SIZE + len], LEN_SIZE + len))
}

/// Validate a length prefix read off a stream. Used by readers that pull the
/// header and the payload separately.
pub fn frame_len(header: &[u8; LEN_SIZE]) -> Result<usize, FrameDecodeError> {
    let len = u32::from_le_bytes(*header);
    if len > MAX_FRAME_LEN {
        return Err(FrameDecodeError::TooLarge);
    }
    Ok(len as usize)
}

/// Error splitting a frame (need more bytes or too large).
#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("need more bytes")]
    NeedMore,
    #[error("frame too large")]
    TooLarge,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::protocol::{Envelope, Status, StatusCode};

    fn keepalive() -> Vec<u8> {
        codec::encode(&Envelope::Status(Status {
            code: StatusCode::KeepaliveReq,
        }))
        .unwrap()
    }

    #[test]
    fn frame_carries_envelope() {
        let payload = keepalive();
        let frame = encode_frame(&payload).unwrap();
        let (got, n) = decode_frame(&frame).unwrap();
        assert_eq!(n, frame.len());
        assert_eq!(got, payload.as_slice());
        assert!(matches!(
            codec::decode(got).unwrap(),
            Envelope::Status(Status {
                code: StatusCode::KeepaliveReq
            })
        ));
    }

    #[test]
    fn partial_read_need_more() {
        let frame = encode_frame(&keepalive()).unwrap();
        assert!(matches!(
            decode_frame(&frame[..2]),
            Err(FrameDecodeError::NeedMore)
        ));
        assert!(matches!(
            decode_frame(&frame[..super::LEN_SIZE]),
            Err(FrameDecodeError::NeedMore)
        ));
    }

    #[test]
    fn multiple_frames() {
        let fa = encode_frame(&keepalive()).unwrap();
        let fb = encode_frame(&[5, 0]).unwrap();
        let mut buf = Vec::new();
        buf.extend_from_slice(&fa);
        buf.extend_from_slice(&fb);
        let (_, n1) = decode_frame(&buf).unwrap();
        assert_eq!(n1, fa.len());
        let (p2, n2) = decode_frame(&buf[n1..]).unwrap();
        assert_eq!(n2, fb.len());
        assert_eq!(p2, &[5, 0]);
    }

    #[test]
    fn oversized_header_rejected() {
        let header = u32::MAX.to_le_bytes();
        assert!(matches!(frame_len(&header), Err(FrameDecodeError::TooLarge)));
        assert!(matches!(
            encode_frame(&vec![0u8; MAX_FRAME_LEN as usize + 1]),
            Err(FrameEncodeError::TooLarge)
        ));
    }
}
