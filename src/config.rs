//! 프로토콜 설정

use std::time::Duration;

use crate::MAX_FRAME_SIZE;

/// SAWP 채널 설정
///
/// 와이어 상수(프레임 크기, 헤더 배치)는 양쪽 피어가 같아야 하므로
/// 여기가 아니라 crate 루트 상수로 고정된다.
#[derive(Debug, Clone)]
pub struct Config {
    /// ACK 대기 타임아웃 (밀리초)
    /// 시도마다 새로 시작하며, 시도 간 누적 데드라인은 없음
    pub ack_timeout_ms: u64,

    /// send 한 번당 최대 전송 시도 횟수
    pub max_send_attempts: u32,

    /// 종료 시 RESET 반복 전송 횟수
    /// RESET 자체는 ACK를 받지 않으므로 여러 번 보냄
    pub reset_repeat: u32,

    /// 수신 버퍼 크기
    pub recv_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 1000,            // 1초
            max_send_attempts: 4,
            reset_repeat: 3,
            recv_buffer_size: MAX_FRAME_SIZE,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// ACK 대기 타임아웃
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// 저지연 LAN용 설정
    pub fn lan() -> Self {
        Self {
            ack_timeout_ms: 200,
            max_send_attempts: 4,
            reset_repeat: 3,
            recv_buffer_size: MAX_FRAME_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_protocol_constants() {
        let config = Config::default();
        assert_eq!(config.ack_timeout(), Duration::from_secs(1));
        assert_eq!(config.max_send_attempts, 4);
        assert!(config.reset_repeat > 1);
        assert!(config.recv_buffer_size >= MAX_FRAME_SIZE);
    }

    #[test]
    fn test_lan_preset() {
        let lan = Config::lan();
        assert!(lan.ack_timeout() < Config::new().ack_timeout());
        assert_eq!(lan.max_send_attempts, Config::new().max_send_attempts);
    }
}
