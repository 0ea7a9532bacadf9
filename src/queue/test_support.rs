//! In-process RESP stub standing in for a redis server in queue tests.
//!
//! Each accepted connection is served strictly serially: one command is
//! read, answered, then the next is read. A parked BLPOP therefore stalls
//! everything behind it on the same socket, exactly as redis does, while
//! other connections keep being served. Commands are logged by name so
//! tests can assert on the traffic.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, Copy, Default)]
pub struct StubOptions {
    /// Answer GET with a RESP error instead of nil, to simulate a broken
    /// record store.
    pub fail_get: bool,
}

pub type CommandLog = Arc<Mutex<Vec<String>>>;

/// Start the stub on an ephemeral port. Returns the redis URL and the
/// command log.
pub async fn spawn_stub(options: StubOptions) -> (String, CommandLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("redis://{}", listener.local_addr().unwrap());
    let log: CommandLog = Arc::new(Mutex::new(Vec::new()));

    let accept_log = log.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(handle_connection(socket, options, accept_log.clone()));
        }
    });

    (url, log)
}

async fn handle_connection(socket: TcpStream, options: StubOptions, log: CommandLog) {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    while let Some(command) = read_command(&mut reader).await {
        let name = command
            .first()
            .map(|part| part.to_ascii_uppercase())
            .unwrap_or_default();
        log.lock().unwrap().push(name.clone());

        let reply: &[u8] = match name.as_str() {
            "PING" => b"+PONG\r\n",
            "BLPOP" => {
                let secs = command
                    .last()
                    .and_then(|arg| arg.parse::<f64>().ok())
                    .unwrap_or(0.0);
                tokio::time::sleep(Duration::from_secs_f64(secs)).await;
                // nothing ever arrives; reply nil after the full block
                b"*-1\r\n"
            }
            "RPUSH" => b":1\r\n",
            "GET" if options.fail_get => b"-ERR stub get failure\r\n",
            "GET" => b"$-1\r\n",
            _ => b"+OK\r\n",
        };

        if write_half.write_all(reply).await.is_err() {
            break;
        }
    }
}

/// Read one client command: an array of bulk strings.
async fn read_command(reader: &mut BufReader<OwnedReadHalf>) -> Option<Vec<String>> {
    let mut header = String::new();
    if reader.read_line(&mut header).await.ok()? == 0 {
        return None;
    }
    let arity: usize = header.strip_prefix('*')?.trim().parse().ok()?;

    let mut parts = Vec::with_capacity(arity);
    for _ in 0..arity {
        let mut len_line = String::new();
        reader.read_line(&mut len_line).await.ok()?;
        let len: usize = len_line.strip_prefix('$')?.trim().parse().ok()?;

        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf).await.ok()?;
        parts.push(String::from_utf8_lossy(&buf[..len]).into_owned());
    }
    Some(parts)
}
