//! # SAWP (Stop-And-Wait Protocol)
//!
//! UDP 위의 2계층 신뢰성 전송 스택
//!
//! ## 구성
//! - **L2 프레임 전송** ([`FrameTransport`]): 목적지 주소, 길이, XOR 체크섬 헤더
//! - **L4 신뢰성 채널** ([`ReliableChannel`]): 1비트 시퀀스 stop-and-wait,
//!   타임아웃 재전송, 중복 제거, 피기백 버퍼, RESET 종료 핸드쉐이크
//!
//! ## 데이터 흐름
//! ```text
//! app -> ReliableChannel::send -> [L4 hdr|data] -> FrameTransport::send -> [L2 hdr|...] -> UDP
//! UDP -> FrameTransport::recv (검증, 헤더 제거) -> ReliableChannel (ACK 응답) -> app
//! ```
//!
//! 채널 하나는 피어 하나만 담당하며, send/recv는 한 흐름에서 순차 호출한다.

pub mod channel;
pub mod config;
pub mod error;
pub mod frame;
pub mod segment;
pub mod stats;
pub mod transport;

pub use channel::ReliableChannel;
pub use config::Config;
pub use error::{Error, Result};
pub use frame::{Frame, FrameHeader};
pub use segment::{Segment, SegmentHeader, SegmentType};
pub use stats::ChannelStats;
pub use transport::FrameTransport;

/// 최대 프레임 크기 (바이트)
pub const MAX_FRAME_SIZE: usize = 1024;

/// L2 헤더 크기: dst_addr(4) + len(2) + checksum(1) + mbz(1)
pub const FRAME_HEADER_SIZE: usize = 8;

/// 프레임 하나에 실을 수 있는 최대 페이로드 (= 최대 세그먼트 크기)
pub const MAX_FRAME_PAYLOAD: usize = MAX_FRAME_SIZE - FRAME_HEADER_SIZE;

/// L4 헤더 크기: type(1) + seqno(1) + ackno(1) + mbz(1)
pub const SEGMENT_HEADER_SIZE: usize = 4;

/// 애플리케이션 메시지 최대 크기. 초과분은 send에서 잘림
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_PAYLOAD - SEGMENT_HEADER_SIZE;
