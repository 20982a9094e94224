//! L4 세그먼트 정의
//!
//! 프레임 페이로드로 운반되는 신뢰성 계층 단위.
//!
//! ```text
//! +-------+-------+-------+-------+
//! | type  | seqno | ackno | mbz   |
//! +-------+-------+-------+-------+
//! | payload (DATA만) ...          |
//! +-------+-------+-------+-------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result, MAX_PAYLOAD_SIZE, SEGMENT_HEADER_SIZE};

/// 1비트 시퀀스/ACK 번호
pub type SeqBit = u8;

/// 세그먼트 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SegmentType {
    /// 애플리케이션 데이터
    Data = 0,

    /// 세션 종료
    Reset = 1,

    /// 확인 응답
    Ack = 2,
}

impl TryFrom<u8> for SegmentType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SegmentType::Data),
            1 => Ok(SegmentType::Reset),
            2 => Ok(SegmentType::Ack),
            _ => Err(Error::InvalidSegmentType { value }),
        }
    }
}

/// 세그먼트 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub segment_type: SegmentType,

    /// DATA에서만 의미 있음
    pub seqno: SeqBit,

    /// ACK에서만 의미 있음: 다음에 기대하는 시퀀스
    pub ackno: SeqBit,
}

/// 세그먼트 (헤더 + 애플리케이션 데이터)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub header: SegmentHeader,
    pub payload: Bytes,
}

impl Segment {
    /// DATA 세그먼트. `MAX_PAYLOAD_SIZE`를 넘는 데이터는 잘라낸다.
    pub fn data(seqno: SeqBit, data: &[u8]) -> Self {
        let len = data.len().min(MAX_PAYLOAD_SIZE);
        Self {
            header: SegmentHeader {
                segment_type: SegmentType::Data,
                seqno: seqno & 1,
                ackno: 0,
            },
            payload: Bytes::copy_from_slice(&data[..len]),
        }
    }

    /// ACK 세그먼트 (페이로드 없음)
    pub fn ack(ackno: SeqBit) -> Self {
        Self {
            header: SegmentHeader {
                segment_type: SegmentType::Ack,
                seqno: 0,
                ackno: ackno & 1,
            },
            payload: Bytes::new(),
        }
    }

    /// RESET 세그먼트 (페이로드 없음)
    pub fn reset() -> Self {
        Self {
            header: SegmentHeader {
                segment_type: SegmentType::Reset,
                seqno: 0,
                ackno: 0,
            },
            payload: Bytes::new(),
        }
    }

    pub fn segment_type(&self) -> SegmentType {
        self.header.segment_type
    }

    /// 바이트로 직렬화
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SEGMENT_HEADER_SIZE + self.payload.len());
        buf.put_u8(self.header.segment_type as u8);
        buf.put_u8(self.header.seqno);
        buf.put_u8(self.header.ackno);
        buf.put_u8(0);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// 바이트에서 역직렬화
    ///
    /// ACK/RESET 뒤에 붙은 바이트는 무시한다. 예약 바이트는 검사하지 않는다.
    pub fn from_bytes(bytes: &Bytes) -> Result<Self> {
        if bytes.len() < SEGMENT_HEADER_SIZE {
            return Err(Error::SegmentTooShort { len: bytes.len() });
        }

        let segment_type = SegmentType::try_from(bytes[0])?;
        let payload = match segment_type {
            SegmentType::Data => bytes.slice(SEGMENT_HEADER_SIZE..),
            SegmentType::Ack | SegmentType::Reset => Bytes::new(),
        };

        Ok(Self {
            header: SegmentHeader {
                segment_type,
                seqno: bytes[1] & 1,
                ackno: bytes[2] & 1,
            },
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_segment_layout() {
        let bytes = Segment::data(1, b"ping").to_bytes();
        assert_eq!(bytes.as_ref(), &[0, 1, 0, 0, b'p', b'i', b'n', b'g']);

        let restored = Segment::from_bytes(&bytes).unwrap();
        assert_eq!(restored.segment_type(), SegmentType::Data);
        assert_eq!(restored.header.seqno, 1);
        assert_eq!(restored.payload.as_ref(), b"ping");
    }

    #[test]
    fn test_control_segments_carry_no_payload() {
        let ack = Segment::ack(1).to_bytes();
        assert_eq!(ack.as_ref(), &[2, 0, 1, 0]);

        let reset = Segment::reset().to_bytes();
        assert_eq!(reset.as_ref(), &[1, 0, 0, 0]);

        // 뒤에 쓰레기가 붙어도 ACK 페이로드는 비어 있음
        let padded = Bytes::from_static(&[2, 0, 1, 0, 9, 9]);
        let restored = Segment::from_bytes(&padded).unwrap();
        assert_eq!(restored.header.ackno, 1);
        assert!(restored.payload.is_empty());
    }

    #[test]
    fn test_data_truncated_to_max_payload() {
        let big = vec![7u8; MAX_PAYLOAD_SIZE + 100];
        let segment = Segment::data(0, &big);
        assert_eq!(segment.payload.len(), MAX_PAYLOAD_SIZE);
        assert_eq!(segment.to_bytes().len(), SEGMENT_HEADER_SIZE + MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_invalid_segments() {
        assert!(matches!(
            Segment::from_bytes(&Bytes::from_static(&[0, 0])),
            Err(Error::SegmentTooShort { len: 2 })
        ));
        assert!(matches!(
            Segment::from_bytes(&Bytes::from_static(&[7, 0, 0, 0])),
            Err(Error::InvalidSegmentType { value: 7 })
        ));
    }

    #[test]
    fn test_empty_data_segment() {
        let bytes = Segment::data(0, &[]).to_bytes();
        let restored = Segment::from_bytes(&bytes).unwrap();
        assert_eq!(restored.segment_type(), SegmentType::Data);
        assert!(restored.payload.is_empty());
    }
}
