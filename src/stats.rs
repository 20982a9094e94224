//! 채널 통계

use std::time::{Duration, Instant};

/// 채널별 송수신 통계
#[derive(Debug, Clone)]
pub struct ChannelStats {
    /// ACK까지 완료된 메시지 수
    pub messages_sent: u64,

    /// ACK까지 완료된 바이트 수 (잘린 길이 기준)
    pub bytes_sent: u64,

    /// DATA 프레임 전송 횟수 (재전송 포함)
    pub transmissions: u64,

    /// 재전송 횟수
    pub retransmissions: u64,

    /// 일치한 ACK 수
    pub acks_received: u64,

    /// 무시된 ACK 수 (기대값과 불일치)
    pub stale_acks: u64,

    /// 애플리케이션에 전달된 메시지 수
    pub messages_received: u64,

    /// 애플리케이션에 전달된 바이트 수
    pub bytes_received: u64,

    /// 보낸 ACK 수
    pub acks_sent: u64,

    /// 버려진 중복 DATA 수
    pub duplicates_dropped: u64,

    /// send 대기 중 버퍼링된 피어 DATA 수
    pub piggybacked: u64,

    /// 검증 실패로 버려진 프레임/세그먼트 수
    pub invalid_frames: u64,

    pub resets_sent: u64,
    pub resets_received: u64,

    /// 채널 생성 시간
    pub started_at: Instant,
}

impl Default for ChannelStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelStats {
    pub fn new() -> Self {
        Self {
            messages_sent: 0,
            bytes_sent: 0,
            transmissions: 0,
            retransmissions: 0,
            acks_received: 0,
            stale_acks: 0,
            messages_received: 0,
            bytes_received: 0,
            acks_sent: 0,
            duplicates_dropped: 0,
            piggybacked: 0,
            invalid_frames: 0,
            resets_sent: 0,
            resets_received: 0,
            started_at: Instant::now(),
        }
    }

    /// 재전송 비율 (전체 DATA 전송 대비)
    pub fn retransmission_rate(&self) -> f64 {
        if self.transmissions == 0 {
            return 0.0;
        }
        self.retransmissions as f64 / self.transmissions as f64
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "sent={} msgs/{} bytes (tx={}, rtx={:.1}%), recv={} msgs/{} bytes, \
             acks={}/{} (stale {}), dup={}, piggyback={}, invalid={}, reset={}/{}, {:.2}s",
            self.messages_sent,
            self.bytes_sent,
            self.transmissions,
            self.retransmission_rate() * 100.0,
            self.messages_received,
            self.bytes_received,
            self.acks_sent,
            self.acks_received,
            self.stale_acks,
            self.duplicates_dropped,
            self.piggybacked,
            self.invalid_frames,
            self.resets_sent,
            self.resets_received,
            self.elapsed().as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retransmission_rate() {
        let mut stats = ChannelStats::new();
        assert_eq!(stats.retransmission_rate(), 0.0);

        stats.transmissions = 8;
        stats.retransmissions = 2;
        assert!((stats.retransmission_rate() - 0.25).abs() < f64::EPSILON);
        assert!(stats.summary().contains("rtx=25.0%"));
    }
}
