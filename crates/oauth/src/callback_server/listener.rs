//! Built-in backend: just enough HTTP/1.1 to read one request line per
//! connection and answer with `Connection: close`.

use std::{sync::Arc, time::Duration};

use {
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        sync::oneshot,
        task::JoinSet,
    },
    tracing::{debug, warn},
};

use super::{Reply, Shared};

const MAX_HEAD_LEN: usize = 8 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(10);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

pub(super) async fn serve(
    listener: TcpListener,
    shared: Arc<Shared>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "auth server connection");
                    connections.spawn(handle_connection(stream, Arc::clone(&shared)));
                },
                Err(e) => warn!(error = %e, "auth server accept failed"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {},
        }
    }
    drop(listener);

    let drain = async { while connections.join_next().await.is_some() {} };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        connections.abort_all();
    }
}

async fn handle_connection(mut stream: TcpStream, shared: Arc<Shared>) {
    let head = match tokio::time::timeout(READ_TIMEOUT, read_head(&mut stream)).await {
        Ok(Ok(head)) => head,
        Ok(Err(e)) => {
            debug!(error = %e, "failed to read auth request");
            return;
        },
        Err(_) => {
            debug!("auth request timed out");
            return;
        },
    };

    let (reply, decision) = match parse_request_line(&head) {
        Some((method, target)) => {
            let (path, query) = match target.split_once('?') {
                Some((path, query)) => (path, Some(query)),
                None => (target, None),
            };
            shared.handle(method, path, query)
        },
        None => (
            Reply {
                status: 400,
                content_type: "text/plain; charset=UTF-8",
                body: "bad request".into(),
            },
            None,
        ),
    };

    let response = render_response(&reply, shared.backend.server_header());
    if let Err(e) = write_all(&mut stream, response.as_bytes()).await {
        debug!(error = %e, "failed to write auth response");
    }
    if let Some(decision) = decision {
        decision.deliver();
    }
}

async fn write_all(stream: &mut TcpStream, bytes: &[u8]) -> std::io::Result<()> {
    stream.write_all(bytes).await?;
    stream.flush().await?;
    stream.shutdown().await
}

/// Read up to the blank line that ends the request head.
async fn read_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if buf.len() > MAX_HEAD_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn parse_request_line(head: &str) -> Option<(&str, &str)> {
    let line = head.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    parts.next()?.starts_with("HTTP/").then_some((method, target))
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "",
    }
}

fn render_response(reply: &Reply, server: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nServer: {server}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reason(reply.status),
        reply.content_type,
        reply.body.len(),
        reply.body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_parsing() {
        assert_eq!(
            parse_request_line("GET /?code=1 HTTP/1.1\r\nHost: x\r\n\r\n"),
            Some(("GET", "/?code=1"))
        );
        assert_eq!(parse_request_line("GET /\r\n"), None);
        assert_eq!(parse_request_line("garbage"), None);
        assert_eq!(parse_request_line(""), None);
    }

    #[test]
    fn response_has_length_and_server() {
        let reply = Reply {
            status: 200,
            content_type: "text/html; charset=UTF-8",
            body: "héllo".into(),
        };
        let raw = render_response(&reply, "yandisk (tokio)");
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("Server: yandisk (tokio)\r\n"));
        // byte length, not char count
        assert!(raw.contains("Content-Length: 6\r\n"));
        assert!(raw.ends_with("\r\n\r\nhéllo"));
    }
}
