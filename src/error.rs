//! 에러 타입 정의

use thiserror::Error;

/// SAWP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 수신 대기 시간 초과 (길이 0 페이로드와 구분됨)
    #[error("수신 타임아웃")]
    Timeout,

    #[error("프레임이 너무 짧음: {len} bytes")]
    FrameTooShort { len: usize },

    #[error("프레임 크기 초과: {len} bytes (최대 {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("길이 필드 불일치: header={header}, actual={actual}")]
    LengthMismatch { header: usize, actual: usize },

    #[error("체크섬 불일치: expected {expected:02X}, got {got:02X}")]
    ChecksumMismatch { expected: u8, got: u8 },

    #[error("예약 필드가 0이 아님: {value:02X}")]
    ReservedNotZero { value: u8 },

    #[error("유효하지 않은 세그먼트 타입: {value}")]
    InvalidSegmentType { value: u8 },

    #[error("세그먼트가 너무 짧음: {len} bytes")]
    SegmentTooShort { len: usize },

    #[error("피어 주소 없음")]
    NoPeer,

    #[error("전송 실패: {attempts}회 시도 후 ACK 없음")]
    SendFailed { attempts: u32 },

    /// 피어가 RESET을 보내 세션이 종료됨
    #[error("피어가 세션을 종료함 (RESET)")]
    ConnectionReset,
}

impl Error {
    /// 피어 측 세션 종료 여부
    pub fn is_quit(&self) -> bool {
        matches!(self, Error::ConnectionReset)
    }

    /// 프레임을 버리고 계속 진행할 수 있는 에러인지
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Timeout
                | Error::FrameTooShort { .. }
                | Error::FrameTooLarge { .. }
                | Error::LengthMismatch { .. }
                | Error::ChecksumMismatch { .. }
                | Error::ReservedNotZero { .. }
                | Error::InvalidSegmentType { .. }
                | Error::SegmentTooShort { .. }
        )
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(Error::ConnectionReset.is_quit());
        assert!(!Error::ConnectionReset.is_transient());

        assert!(Error::Timeout.is_transient());
        assert!(Error::ChecksumMismatch { expected: 1, got: 2 }.is_transient());

        let failed = Error::SendFailed { attempts: 4 };
        assert!(!failed.is_quit());
        assert!(!failed.is_transient());
    }
}
