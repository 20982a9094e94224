//! L2 프레임 정의
//!
//! 데이터그램 하나 = 프레임 하나. 모든 다중 바이트 필드는 빅엔디언.
//!
//! ```text
//! 0       8       16      24      32
//! +-------+-------+-------+-------+
//! | dst_addr (IPv4)               |
//! +-------+-------+-------+-------+
//! | len           | cksum | mbz   |
//! +-------+-------+-------+-------+
//! | payload (len - 8 bytes) ...   |
//! +-------+-------+-------+-------+
//! ```
//!
//! - `len`: 헤더 + 페이로드 전체 길이
//! - `cksum`: 체크섬 바이트를 0으로 둔 프레임 전체의 XOR
//!
//! XOR 체크섬은 같은 비트 위치에서 짝수 개의 비트가 뒤집힌 경우를 잡지 못한다.

use std::net::{IpAddr, SocketAddr};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Error, Result, FRAME_HEADER_SIZE, MAX_FRAME_PAYLOAD, MAX_FRAME_SIZE};

/// 헤더 내 체크섬 바이트 위치
pub const CHECKSUM_OFFSET: usize = 6;

/// 프레임 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// 목적지 IPv4 주소
    pub dst_addr: u32,

    /// 헤더 + 페이로드 길이
    pub len: u16,

    /// XOR 체크섬
    pub checksum: u8,

    /// 예약 (항상 0)
    pub reserved: u8,
}

impl FrameHeader {
    fn put(&self, buf: &mut BytesMut) {
        buf.put_u32(self.dst_addr);
        buf.put_u16(self.len);
        buf.put_u8(self.checksum);
        buf.put_u8(self.reserved);
    }
}

/// 프레임 (헤더 + 불투명 페이로드)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    /// 새 프레임 생성 (체크섬 계산 포함)
    pub fn new(dst_addr: u32, payload: Bytes) -> Result<Self> {
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(Error::FrameTooLarge {
                len: payload.len() + FRAME_HEADER_SIZE,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut header = FrameHeader {
            dst_addr,
            len: (FRAME_HEADER_SIZE + payload.len()) as u16,
            checksum: 0,
            reserved: 0,
        };

        let mut scratch = BytesMut::with_capacity(FRAME_HEADER_SIZE);
        header.put(&mut scratch);
        header.checksum = xor_checksum(&scratch) ^ xor_checksum(&payload);

        Ok(Self { header, payload })
    }

    /// 와이어 바이트로 직렬화
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        self.header.put(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// 수신 바이트 검증 후 역직렬화
    ///
    /// 최소 길이, 체크섬, 길이 필드, 예약 필드 순으로 확인한다.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(Error::FrameTooShort { len: bytes.len() });
        }
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge {
                len: bytes.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let got = bytes[CHECKSUM_OFFSET];
        // 체크섬 바이트를 0으로 간주: XOR에서 자기 자신을 한 번 더 빼면 됨
        let expected = xor_checksum(bytes) ^ got;
        if expected != got {
            return Err(Error::ChecksumMismatch { expected, got });
        }

        let mut cursor = &bytes[..FRAME_HEADER_SIZE];
        let header = FrameHeader {
            dst_addr: cursor.get_u32(),
            len: cursor.get_u16(),
            checksum: cursor.get_u8(),
            reserved: cursor.get_u8(),
        };

        if header.len as usize != bytes.len() {
            return Err(Error::LengthMismatch {
                header: header.len as usize,
                actual: bytes.len(),
            });
        }

        if header.reserved != 0 {
            return Err(Error::ReservedNotZero {
                value: header.reserved,
            });
        }

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(&bytes[FRAME_HEADER_SIZE..]),
        })
    }
}

/// 바이트 단위 XOR 체크섬
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// 수신 프레임이 유효한지 확인
pub fn verify(bytes: &[u8]) -> bool {
    Frame::from_bytes(bytes).is_ok()
}

/// 헤더에 기록할 목적지 주소
///
/// IPv4-mapped IPv6는 IPv4로 풀고, 그 외 IPv6는 0.
pub fn dst_addr_of(addr: &SocketAddr) -> u32 {
    match addr.ip() {
        IpAddr::V4(ip) => u32::from(ip),
        IpAddr::V6(ip) => ip.to_ipv4_mapped().map(u32::from).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bytes {
        Frame::new(0x7f00_0001, Bytes::from_static(b"hello frame"))
            .unwrap()
            .to_bytes()
    }

    #[test]
    fn test_frame_layout() {
        let bytes = sample();

        assert_eq!(bytes.len(), FRAME_HEADER_SIZE + 11);
        assert_eq!(&bytes[0..4], &[127, 0, 0, 1]);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]) as usize, bytes.len());
        assert_eq!(bytes[7], 0);
        assert_eq!(&bytes[FRAME_HEADER_SIZE..], b"hello frame");
    }

    #[test]
    fn test_checksum_covers_whole_frame() {
        let bytes = sample();
        // 체크섬을 포함한 전체 XOR은 0이 되어야 함
        assert_eq!(xor_checksum(&bytes), 0);
        assert!(verify(&bytes));
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let bytes = sample();

        for idx in 0..bytes.len() {
            for bit in 0..8 {
                let mut corrupted = bytes.to_vec();
                corrupted[idx] ^= 1 << bit;
                assert!(!verify(&corrupted), "byte {} bit {} not detected", idx, bit);
            }
        }
    }

    #[test]
    fn test_paired_bit_flip_is_blind_spot() {
        let mut corrupted = sample().to_vec();
        // 같은 비트 위치의 짝수 번 뒤집힘은 XOR로 검출 불가
        corrupted[FRAME_HEADER_SIZE] ^= 0x01;
        corrupted[FRAME_HEADER_SIZE + 1] ^= 0x01;
        assert!(verify(&corrupted));
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let bytes = sample();

        assert!(matches!(
            Frame::from_bytes(&bytes[..FRAME_HEADER_SIZE - 1]),
            Err(Error::FrameTooShort { len: 7 })
        ));

        // 끝 바이트를 잘라내면 체크섬 또는 길이 검사에서 걸림
        assert!(Frame::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_length_mismatch_with_valid_checksum() {
        let frame = Frame::new(0, Bytes::from_static(b"abcd")).unwrap();
        let mut bytes = frame.to_bytes().to_vec();
        // 길이 필드를 바꾸고 체크섬을 다시 맞춤
        bytes[5] = bytes[5].wrapping_add(1);
        bytes[CHECKSUM_OFFSET] = 0;
        bytes[CHECKSUM_OFFSET] = xor_checksum(&bytes);

        assert!(matches!(
            Frame::from_bytes(&bytes),
            Err(Error::LengthMismatch { header: 13, actual: 12 })
        ));
    }

    #[test]
    fn test_reserved_must_be_zero() {
        let mut bytes = Frame::new(0, Bytes::new()).unwrap().to_bytes().to_vec();
        bytes[7] = 0x10;
        bytes[CHECKSUM_OFFSET] = 0;
        bytes[CHECKSUM_OFFSET] = xor_checksum(&bytes);

        assert!(matches!(
            Frame::from_bytes(&bytes),
            Err(Error::ReservedNotZero { value: 0x10 })
        ));
    }

    #[test]
    fn test_payload_size_limit() {
        assert!(Frame::new(0, Bytes::from(vec![0u8; MAX_FRAME_PAYLOAD])).is_ok());
        assert!(matches!(
            Frame::new(0, Bytes::from(vec![0u8; MAX_FRAME_PAYLOAD + 1])),
            Err(Error::FrameTooLarge { len: 1025, max: 1024 })
        ));
    }

    #[test]
    fn test_empty_payload() {
        let bytes = Frame::new(1, Bytes::new()).unwrap().to_bytes();
        let frame = Frame::from_bytes(&bytes).unwrap();
        assert_eq!(frame.header.len as usize, FRAME_HEADER_SIZE);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_dst_addr_of() {
        let v4: SocketAddr = "10.1.2.3:9000".parse().unwrap();
        assert_eq!(dst_addr_of(&v4), 0x0a01_0203);

        let mapped: SocketAddr = "[::ffff:10.1.2.3]:9000".parse().unwrap();
        assert_eq!(dst_addr_of(&mapped), 0x0a01_0203);

        let v6: SocketAddr = "[::1]:9000".parse().unwrap();
        assert_eq!(dst_addr_of(&v6), 0);
    }
}
