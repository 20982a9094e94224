//! SAWP 클라이언트
//!
//! 같은 메시지를 N번 보내고 서버의 에코를 확인한 뒤 세션을 종료한다.
//!
//! 사용법:
//!   cargo run --release --bin sawp-client -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin sawp-client -- --server 127.0.0.1:9000 --count 10
//!   cargo run --bin sawp-client -- -s 10.0.0.2:9000 -m "hello" --timeout-ms 200

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Instant;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sawp::{Config, ReliableChannel};

/// 클라이언트 설정
struct ClientConfig {
    server_addr: SocketAddr,
    count: usize,
    message: String,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            count: 5,
            message: "ping".to_string(),
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

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => {
                config.server_addr = parse_value(&args, i, "주소");
                i += 1;
            }
            "--count" | "-n" => {
                config.count = parse_value(&args, i, "숫자");
                i += 1;
            }
            "--message" | "-m" => {
                config.message = parse_value(&args, i, "문자열");
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
                    r#"SAWP Client - Stop-And-Wait Protocol 클라이언트

메시지를 보내고 서버 에코를 기다린 뒤 RESET으로 세션을 닫는다.

사용법:
  cargo run --release --bin sawp-client -- [OPTIONS]

옵션:
  -s, --server <ADDR>     서버 주소 (기본: 127.0.0.1:9000)
  -n, --count <N>         보낼 메시지 수 (기본: 5)
  -m, --message <TEXT>    보낼 메시지 (기본: ping)
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

    let client_config = parse_args();

    info!("SAWP Client starting...");
    info!("Server address: {}", client_config.server_addr);

    let mut channel =
        ReliableChannel::connect(client_config.server_addr, client_config.config).await?;
    let start = Instant::now();
    let mut echoed = 0;

    for i in 0..client_config.count {
        let sent = match channel.send(client_config.message.as_bytes()).await {
            Ok(sent) => sent,
            Err(e) if e.is_quit() => {
                info!("Server closed the session");
                break;
            }
            Err(e) => {
                warn!("Message {} not delivered: {}", i + 1, e);
                break;
            }
        };

        let echo = match channel.recv_bytes().await {
            Ok(echo) => echo,
            Err(e) if e.is_quit() => {
                info!("Server closed the session");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if echo.as_ref() == &client_config.message.as_bytes()[..sent] {
            echoed += 1;
            info!("[{}/{}] echo OK ({} bytes)", i + 1, client_config.count, sent);
        } else {
            warn!(
                "[{}/{}] echo mismatch: {}",
                i + 1,
                client_config.count,
                String::from_utf8_lossy(&echo)
            );
        }
    }

    let elapsed = start.elapsed();
    info!("Session complete!");
    info!("  Echoed: {}/{}", echoed, client_config.count);
    info!("  Time: {:.2}s", elapsed.as_secs_f64());
    info!("  Stats: {}", channel.stats().summary());

    channel.close().await?;

    Ok(())
}
