//! L4 신뢰성 채널
//!
//! - 1비트 시퀀스 stop-and-wait
//! - 시도당 고정 타임아웃 재전송
//! - 중복 DATA 제거 (ACK는 항상 응답)
//! - send 중 도착한 피어 DATA 1개 버퍼링 (피기백)
//! - RESET 수신 시 세션 종료, 종료 시 RESET 반복 전송
//!
//! ACK 규칙: 시퀀스 N을 받은 쪽은 다음 기대값 `N ^ 1`을 ackno로 보낸다.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::segment::{Segment, SegmentType, SeqBit};
use crate::stats::ChannelStats;
use crate::transport::FrameTransport;
use crate::{Config, Error, Result, MAX_PAYLOAD_SIZE};

/// 피어 하나와의 stop-and-wait 세션
///
/// send/recv는 `&mut self`라 동시에 호출될 수 없다. 여러 태스크가 공유하려면
/// 호출 전체를 감싸는 락이 필요하다.
#[derive(Debug)]
pub struct ReliableChannel {
    config: Config,
    transport: FrameTransport,

    /// 다음에 보낼 DATA의 시퀀스
    send_seq: SeqBit,

    /// 마지막으로 받아들인 새 DATA의 시퀀스 (초기값 1 = 아직 없음)
    last_recv_seq: SeqBit,

    /// 마지막으로 보낸 ackno
    last_ack_sent: SeqBit,

    /// 피어 RESET 수신 여부
    reset: bool,

    /// 피기백 버퍼 (최대 1개)
    pending: Option<Bytes>,

    /// close()로 RESET을 이미 보냈는지
    closed: bool,

    stats: ChannelStats,
}

impl ReliableChannel {
    /// 프레임 전송 계층 위에 채널 생성
    pub fn new(mut transport: FrameTransport, config: Config) -> Self {
        transport.set_recv_buffer_size(config.recv_buffer_size);

        Self {
            config,
            transport,
            send_seq: 0,
            last_recv_seq: 1,
            last_ack_sent: 0,
            reset: false,
            pending: None,
            closed: false,
            stats: ChannelStats::new(),
        }
    }

    /// 클라이언트용: `peer`로 향하는 채널
    pub async fn connect(peer: SocketAddr, config: Config) -> Result<Self> {
        let transport = FrameTransport::connect(peer).await?;
        info!("SAWP channel to {} (local {})", peer, transport.local_addr()?);
        Ok(Self::new(transport, config))
    }

    /// 서버용: `local`에서 첫 피어를 기다리는 채널
    pub async fn bind(local: SocketAddr, config: Config) -> Result<Self> {
        let transport = FrameTransport::bind(local).await?;
        info!("SAWP channel listening on {}", transport.local_addr()?);
        Ok(Self::new(transport, config))
    }

    /// 메시지 하나 전송
    ///
    /// `MAX_PAYLOAD_SIZE`를 넘는 데이터는 잘린다. ACK를 받으면 실제로 보낸
    /// 바이트 수를 반환한다.
    ///
    /// - 재시도 소진: `Error::SendFailed`
    /// - 피어 RESET: `Error::ConnectionReset` (이후 호출도 동일, I/O 없음)
    pub async fn send(&mut self, data: &[u8]) -> Result<usize> {
        if self.reset {
            return Err(Error::ConnectionReset);
        }

        if data.len() > MAX_PAYLOAD_SIZE {
            debug!("truncating message from {} to {} bytes", data.len(), MAX_PAYLOAD_SIZE);
        }

        let segment = Segment::data(self.send_seq, data);
        let len = segment.payload.len();
        let bytes = segment.to_bytes();
        let expected_ack = self.send_seq ^ 1;

        for attempt in 1..=self.config.max_send_attempts {
            self.transport.send(&bytes).await?;
            self.stats.transmissions += 1;
            if attempt > 1 {
                self.stats.retransmissions += 1;
                debug!(
                    "retransmit seq={} attempt {}/{}",
                    self.send_seq, attempt, self.config.max_send_attempts
                );
            } else {
                trace!("DATA seq={} sent: {} bytes", self.send_seq, len);
            }

            // 시도마다 타이머 재시작
            let deadline = Instant::now() + self.config.ack_timeout();

            loop {
                let segment = match self.recv_segment(Some(deadline)).await {
                    Ok(segment) => segment,
                    Err(Error::Timeout) => break,
                    Err(e) if e.is_transient() => continue,
                    Err(e) => return Err(e),
                };

                match segment.segment_type() {
                    SegmentType::Ack if segment.header.ackno == expected_ack => {
                        self.send_seq = expected_ack;
                        self.stats.acks_received += 1;
                        self.stats.messages_sent += 1;
                        self.stats.bytes_sent += len as u64;
                        trace!("ACK {} received, next seq={}", segment.header.ackno, self.send_seq);
                        return Ok(len);
                    }
                    SegmentType::Ack => {
                        // 불일치 ACK는 시도를 소모하지 않음
                        self.stats.stale_acks += 1;
                        debug!(
                            "stale ACK {} ignored (waiting for {})",
                            segment.header.ackno, expected_ack
                        );
                    }
                    SegmentType::Reset => {
                        self.on_reset();
                        return Err(Error::ConnectionReset);
                    }
                    SegmentType::Data => {
                        self.on_data_while_sending(segment).await?;
                    }
                }
            }
        }

        warn!(
            "send failed: no ACK for seq={} after {} attempts",
            self.send_seq, self.config.max_send_attempts
        );
        Err(Error::SendFailed {
            attempts: self.config.max_send_attempts,
        })
    }

    /// 메시지 하나 수신 (타임아웃 없음)
    ///
    /// 피기백 버퍼가 차 있으면 네트워크 대기 없이 바로 반환한다.
    pub async fn recv_bytes(&mut self) -> Result<Bytes> {
        if let Some(payload) = self.pending.take() {
            trace!("delivering piggybacked message: {} bytes", payload.len());
            self.record_delivery(&payload);
            return Ok(payload);
        }

        if self.reset {
            return Err(Error::ConnectionReset);
        }

        loop {
            let segment = match self.recv_segment(None).await {
                Ok(segment) => segment,
                Err(e) if e.is_transient() => continue,
                Err(e) => return Err(e),
            };

            match segment.segment_type() {
                SegmentType::Reset => {
                    self.on_reset();
                    return Err(Error::ConnectionReset);
                }
                SegmentType::Ack => {
                    self.stats.stale_acks += 1;
                    trace!("ACK {} ignored while receiving", segment.header.ackno);
                }
                SegmentType::Data => {
                    let seq = segment.header.seqno;
                    // 중복이어도 ACK는 먼저 보냄
                    self.send_ack(seq).await?;

                    if seq == self.last_recv_seq {
                        self.stats.duplicates_dropped += 1;
                        debug!("duplicate DATA seq={} dropped", seq);
                        continue;
                    }

                    self.last_recv_seq = seq;
                    self.record_delivery(&segment.payload);
                    return Ok(segment.payload);
                }
            }
        }
    }

    /// 메시지 하나를 `buf`에 복사. `buf`보다 긴 메시지는 잘린다.
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let payload = self.recv_bytes().await?;
        let n = payload.len().min(buf.len());
        if n < payload.len() {
            debug!("message truncated to caller buffer: {} -> {} bytes", payload.len(), n);
        }
        buf[..n].copy_from_slice(&payload[..n]);
        Ok(n)
    }

    /// 세션 종료: RESET을 `reset_repeat`회 보내고 전송 계층을 해제
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;

        let reset = Segment::reset().to_bytes();
        let mut last_err = None;

        for _ in 0..self.config.reset_repeat {
            match self.transport.send(&reset).await {
                Ok(()) => self.stats.resets_sent += 1,
                Err(Error::NoPeer) => {
                    debug!("no peer known, skipping RESET");
                    break;
                }
                Err(e) => {
                    warn!("RESET 전송 실패: {}", e);
                    last_err = Some(e);
                }
            }
        }

        info!("SAWP channel closed: {}", self.stats.summary());

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 다음 send에 쓰일 시퀀스
    pub fn send_sequence(&self) -> SeqBit {
        self.send_seq
    }

    pub fn last_received_sequence(&self) -> SeqBit {
        self.last_recv_seq
    }

    pub fn last_ack_sent(&self) -> SeqBit {
        self.last_ack_sent
    }

    /// 피어 RESET 수신 여부
    pub fn is_reset(&self) -> bool {
        self.reset
    }

    /// 피기백 버퍼에 메시지가 있는지
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.transport.peer_addr()
    }

    /// 프레임 하나를 받아 세그먼트로 해석. 검증 실패는 통계에 기록된다.
    async fn recv_segment(&mut self, deadline: Option<Instant>) -> Result<Segment> {
        let received = match deadline {
            Some(deadline) => self.transport.recv_until(deadline).await,
            None => self.transport.recv(None).await,
        };

        let bytes = match received {
            Ok(bytes) => bytes,
            Err(Error::Timeout) => return Err(Error::Timeout),
            Err(e) => {
                if e.is_transient() {
                    self.stats.invalid_frames += 1;
                }
                return Err(e);
            }
        };

        Segment::from_bytes(&bytes).map_err(|e| {
            self.stats.invalid_frames += 1;
            debug!("undecodable segment dropped: {}", e);
            e
        })
    }

    /// send 대기 중 도착한 피어 DATA 처리
    async fn on_data_while_sending(&mut self, segment: Segment) -> Result<()> {
        let seq = segment.header.seqno;

        if seq == self.last_recv_seq {
            self.send_ack(seq).await?;
            self.stats.duplicates_dropped += 1;
            debug!("duplicate DATA seq={} dropped while sending", seq);
        } else if self.pending.is_none() {
            self.send_ack(seq).await?;
            self.last_recv_seq = seq;
            self.pending = Some(segment.payload);
            self.stats.piggybacked += 1;
            debug!("DATA seq={} buffered while sending", seq);
        } else {
            // 피기백 버퍼는 1개뿐: ACK하면 이 DATA는 유실되므로 재전송을 기다림
            debug!("piggyback buffer full, DATA seq={} left unacknowledged", seq);
        }

        Ok(())
    }

    /// 받은 DATA 시퀀스에 대한 ackno 결정
    ///
    /// 새 데이터면 `seq ^ 1`, 재전송(이전 ACK 유실)이면 지난번 값을 그대로.
    fn ack_value(&self, seq: SeqBit) -> SeqBit {
        if seq != self.last_recv_seq {
            seq ^ 1
        } else {
            self.last_ack_sent
        }
    }

    async fn send_ack(&mut self, seq: SeqBit) -> Result<SeqBit> {
        let ackno = self.ack_value(seq);
        self.transport.send(&Segment::ack(ackno).to_bytes()).await?;
        self.last_ack_sent = ackno;
        self.stats.acks_sent += 1;
        trace!("ACK {} sent for DATA seq={}", ackno, seq);
        Ok(ackno)
    }

    fn on_reset(&mut self) {
        if !self.reset {
            info!("peer reset the session");
        }
        self.reset = true;
        self.stats.resets_received += 1;
    }

    fn record_delivery(&mut self, payload: &Bytes) {
        self.stats.messages_received += 1;
        self.stats.bytes_received += payload.len() as u64;
    }
}

impl Drop for ReliableChannel {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        // close() 없이 버려진 경우: 논블로킹으로 RESET만 시도
        let reset = Segment::reset().to_bytes();
        for _ in 0..self.config.reset_repeat {
            match self.transport.try_send(&reset) {
                Ok(()) => self.stats.resets_sent += 1,
                Err(e) => {
                    debug!("RESET on drop failed: {}", e);
                    break;
                }
            }
        }
    }
}
