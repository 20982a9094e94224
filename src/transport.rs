//! L2 프레임 전송 계층
//!
//! - UDP 소켓 하나 + 현재 피어 주소 하나
//! - 송신: 헤더/체크섬 부착
//! - 수신: 검증 후 헤더 제거, 송신자를 새 피어로 기록
//!
//! 전달 보장 없음 (best-effort)

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::frame::{dst_addr_of, Frame};
use crate::{Error, Result, MAX_FRAME_SIZE};

/// 프레임 단위 UDP 엔드포인트
///
/// 소켓은 이 구조체가 소유하며 drop 시 닫힌다. 네트워크 알림은 없음.
#[derive(Debug)]
pub struct FrameTransport {
    socket: UdpSocket,

    /// 송신 대상. 유효한 프레임을 받을 때마다 송신자로 갱신됨
    peer: Option<SocketAddr>,

    /// 수신 버퍼
    recv_buf: Vec<u8>,
}

impl FrameTransport {
    /// 클라이언트용: 임시 포트에 바인딩하고 `peer`를 목적지로 설정
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let mut transport = Self::bind(local).await?;
        transport.peer = Some(peer);
        Ok(transport)
    }

    /// 서버용: `local`에 바인딩. 피어는 첫 수신 프레임에서 결정됨
    pub async fn bind(local: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        debug!("FrameTransport bound on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            peer: None,
            recv_buf: vec![0u8; MAX_FRAME_SIZE],
        })
    }

    /// 수신 버퍼 크기 변경 (최소 `MAX_FRAME_SIZE`)
    pub fn set_recv_buffer_size(&mut self, size: usize) {
        self.recv_buf.resize(size.max(MAX_FRAME_SIZE), 0);
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    /// 현재 피어에게 프레임 하나 전송
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        let (bytes, peer) = self.build(payload)?;
        self.socket.send_to(&bytes, peer).await?;
        trace!("frame sent: {} bytes -> {}", bytes.len(), peer);
        Ok(())
    }

    /// 논블로킹 전송 (drop 경로에서 사용)
    pub fn try_send(&self, payload: &[u8]) -> Result<()> {
        let (bytes, peer) = self.build(payload)?;
        self.socket.try_send_to(&bytes, peer)?;
        trace!("frame sent (nonblocking): {} bytes -> {}", bytes.len(), peer);
        Ok(())
    }

    fn build(&self, payload: &[u8]) -> Result<(Bytes, SocketAddr)> {
        let peer = self.peer.ok_or(Error::NoPeer)?;
        let frame = Frame::new(dst_addr_of(&peer), Bytes::copy_from_slice(payload))?;
        Ok((frame.to_bytes(), peer))
    }

    /// 프레임 하나 수신
    ///
    /// `timeout`이 `None`이면 무기한 대기. 시간 초과는 `Error::Timeout`,
    /// 검증 실패는 해당 에러로 보고되고 프레임은 버려진다.
    pub async fn recv(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        match timeout {
            None => self.recv_frame().await,
            Some(timeout) => tokio::time::timeout(timeout, self.recv_frame())
                .await
                .map_err(|_| Error::Timeout)?,
        }
    }

    /// `deadline`까지 프레임 하나 수신
    pub async fn recv_until(&mut self, deadline: Instant) -> Result<Bytes> {
        tokio::time::timeout_at(deadline, self.recv_frame())
            .await
            .map_err(|_| Error::Timeout)?
    }

    async fn recv_frame(&mut self) -> Result<Bytes> {
        let (len, from) = self.socket.recv_from(&mut self.recv_buf).await?;

        let frame = match Frame::from_bytes(&self.recv_buf[..len]) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("invalid frame from {} ({} bytes): {}", from, len, e);
                return Err(e);
            }
        };

        if self.peer != Some(from) {
            debug!("peer address updated: {:?} -> {}", self.peer, from);
        }
        self.peer = Some(from);

        trace!("frame received: {} bytes <- {}", len, from);
        Ok(frame.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::xor_checksum;
    use crate::{FRAME_HEADER_SIZE, MAX_FRAME_PAYLOAD};

    async fn pair() -> (FrameTransport, FrameTransport) {
        let server = FrameTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();

        let mut client = FrameTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        client.set_peer(server_addr);
        (server, client)
    }

    #[tokio::test]
    async fn test_send_recv_learns_peer() {
        let (mut server, mut client) = pair().await;
        assert!(server.peer_addr().is_none());

        client.send(b"hello").await.unwrap();
        let payload = server.recv(Some(Duration::from_secs(2))).await.unwrap();
        assert_eq!(payload.as_ref(), b"hello");
        assert_eq!(server.peer_addr(), Some(client.local_addr().unwrap()));

        // 서버가 배운 주소로 응답
        server.send(b"world").await.unwrap();
        let payload = client.recv(Some(Duration::from_secs(2))).await.unwrap();
        assert_eq!(payload.as_ref(), b"world");
    }

    #[tokio::test]
    async fn test_zero_length_payload_is_not_timeout() {
        let (mut server, client) = pair().await;

        client.send(&[]).await.unwrap();
        let payload = server.recv(Some(Duration::from_secs(2))).await.unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_recv_timeout() {
        let (mut server, _client) = pair().await;

        let result = server.recv(Some(Duration::from_millis(50))).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn test_send_without_peer() {
        let (server, _client) = pair().await;
        assert!(matches!(server.send(b"x").await, Err(Error::NoPeer)));
        assert!(matches!(server.try_send(b"x"), Err(Error::NoPeer)));
    }

    #[tokio::test]
    async fn test_oversized_send_rejected() {
        let (_server, client) = pair().await;

        let too_big = vec![0u8; MAX_FRAME_PAYLOAD + 1];
        assert!(matches!(
            client.send(&too_big).await,
            Err(Error::FrameTooLarge { .. })
        ));
        assert!(client.send(&too_big[..MAX_FRAME_PAYLOAD]).await.is_ok());
    }

    #[tokio::test]
    async fn test_corrupted_datagram_discarded() {
        let (mut server, _client) = pair().await;
        let server_addr = server.local_addr().unwrap();

        let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // 체크섬이 틀린 프레임
        let mut bad = Frame::new(0, Bytes::from_static(b"data"))
            .unwrap()
            .to_bytes()
            .to_vec();
        bad[FRAME_HEADER_SIZE] ^= 0x40;
        raw.send_to(&bad, server_addr).await.unwrap();

        let result = server.recv(Some(Duration::from_secs(2))).await;
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
        // 검증 실패 프레임은 피어를 바꾸지 않음
        assert!(server.peer_addr().is_none());

        // 헤더보다 짧은 데이터그램
        raw.send_to(&[1, 2, 3], server_addr).await.unwrap();
        let result = server.recv(Some(Duration::from_secs(2))).await;
        assert!(matches!(result, Err(Error::FrameTooShort { len: 3 })));
    }

    #[tokio::test]
    async fn test_raw_frame_accepted() {
        let (mut server, _client) = pair().await;
        let server_addr = server.local_addr().unwrap();
        let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // 직접 만든 프레임: dst=0, len=10, cksum, mbz=0, payload "ok"
        let mut bytes = vec![0, 0, 0, 0, 0, 10, 0, 0, b'o', b'k'];
        bytes[6] = xor_checksum(&bytes);
        raw.send_to(&bytes, server_addr).await.unwrap();

        let payload = server.recv(None).await.unwrap();
        assert_eq!(payload.as_ref(), b"ok");
        assert_eq!(server.peer_addr(), Some(raw.local_addr().unwrap()));
    }
}
