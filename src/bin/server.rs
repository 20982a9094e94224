//! SAWP 에코 서버
//!
//! 받은 메시지를 로그로 남기고 그대로 돌려보낸다. 피어가 RESET을 보내면 종료.
//!
//! 사용법:
//!   cargo run --release --bin sawp-server -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin sawp-server -- --port 9000
//!   RUST_LOG=sawp=debug cargo run --bin sawp-server -- -p 9000 --timeout-ms 200

use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sawp::{Config, Error, ReliableChannel};

/// 서버 설정
struct ServerConfig {
    port: u16,
    config: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            config: Config::default(),
        }
    }
}

fn parse_value<T: FromStr>(args: &[String], i: usize, what: &str) -> T {
    match args.get(i + 1).map(|v| v.parse()) {
        Some(Ok(value)) => value,
        _ => {
            eprintln!("{} 옵션에 유효한 {} 필요", args[i], what);
            std::process::exit(2);
        }
    }
}

fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                config.port = parse_value(&args, i, "포트");
                i += 1;
            }
            "--timeout-ms" => {
                config.config.ack_timeout_ms = parse_value(&args, i, "숫자");
                i += 1;
            }
            "--attempts" => {
                config.config.max_send_attempts = parse_value(&args, i, "숫자");
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"SAWP Server - Stop-And-Wait Protocol 에코 서버

받은 메시지를 그대로 돌려보내며, 피어가 세션을 종료하면 끝난다.

사용법:
  cargo run --release --bin sawp-server -- [OPTIONS]

옵션:
  -p, --port <PORT>       수신 포트 (기본: 9000)
  --timeout-ms <MS>       ACK 대기 타임아웃 (기본: 1000)
  --attempts <N>          메시지당 최대 전송 시도 (기본: 4)
  -h, --help              이 도움말 출력

로그 레벨은 RUST_LOG로 조정 (기본: info)
"#
                );
                std::process::exit(0);
            }
            other => {
                warn!("알 수 없는 옵션 무시: {}", other);
            }
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정 (RUST_LOG, 기본 info)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let server_config = parse_args();
    let local = SocketAddr::from((Ipv4Addr::UNSPECIFIED, server_config.port));

    info!("SAWP Server starting...");
    info!("ACK timeout: {:?}", server_config.config.ack_timeout());
    info!("Max attempts: {}", server_config.config.max_send_attempts);

    let mut channel = ReliableChannel::bind(local, server_config.config).await?;

    loop {
        let message = match channel.recv_bytes().await {
            Ok(message) => message,
            Err(e) if e.is_quit() => {
                info!("Client closed the session");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Received {} bytes from {:?}: {}",
            message.len(),
            channel.peer_addr(),
            String::from_utf8_lossy(&message)
        );

        match channel.send(&message).await {
            Ok(_) => {}
            Err(Error::ConnectionReset) => {
                info!("Client closed the session during echo");
                break;
            }
            Err(Error::SendFailed { attempts }) => {
                warn!("Echo not acknowledged after {} attempts", attempts);
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Stats: {}", channel.stats().summary());
    channel.close().await?;

    Ok(())
}
