use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::Error;

// A redirected browser should deliver its request line near-instantly; a
// connection slower than this is not the provider redirect.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

const CONSENT_PAGE: &str = "<!DOCTYPE html>
<html lang=\"en\">
<head><meta charset=\"UTF-8\"><title>Spotify authorization</title></head>
<body>
<p>Authorization received. You can close this window.</p>
</body>
</html>";

const ERROR_PAGE: &str = "<!DOCTYPE html>
<html lang=\"en\">
<head><meta charset=\"UTF-8\"><title>Spotify authorization</title></head>
<body>
<p>No authorization code in the request. Still waiting for the redirect.</p>
</body>
</html>";

/// Single-use loopback acceptor for the provider's consent redirect.
///
/// Binding is separate from capturing so a port clash surfaces to the caller
/// immediately instead of inside the background task.
pub struct CallbackListener {
    listener: TcpListener,
}

impl CallbackListener {
    pub async fn bind(port: u16) -> Result<Self, Error> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Network(format!("bind callback listener on {}: {}", addr, e)))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.listener
            .local_addr()
            .map_err(|e| Error::unknown(format!("listener local addr: {}", e)))
    }

    /// Accept connections until one carries a `code` query parameter, the
    /// deadline expires, or `cancel` fires. A request line without a code
    /// gets an error page and the listener keeps waiting. Consumes the
    /// listener: after the first capture the socket is gone.
    pub async fn capture_code(
        self,
        timeout: Duration,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<String, Error> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let accepted = tokio::select! {
                r = self.listener.accept() => r,
                _ = cancel.changed() => {
                    debug!("callback listener cancelled");
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!("callback listener timed out after {:?}", timeout);
                    return Err(Error::Cancelled);
                }
            };
            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("callback accept failed: {}", e);
                    continue;
                }
            };
            debug!("callback connection from {}", peer);
            match tokio::time::timeout(CONNECTION_TIMEOUT, handle_connection(stream)).await {
                Ok(Ok(code)) => return Ok(code),
                Ok(Err(Error::MalformedCallback)) => {
                    warn!("callback request carried no code; keeping the listener open");
                }
                Ok(Err(e)) => warn!("callback connection error: {}", e),
                Err(_) => warn!("callback connection stalled; dropped"),
            }
        }
    }
}

async fn handle_connection(stream: TcpStream) -> Result<String, Error> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| Error::Network(format!("read callback request: {}", e)))?;
    let code = extract_code(&line);
    let mut stream = reader.into_inner();
    match code {
        Some(code) => {
            respond(&mut stream, "200 OK", CONSENT_PAGE).await;
            Ok(code)
        }
        None => {
            respond(&mut stream, "400 Bad Request", ERROR_PAGE).await;
            Err(Error::MalformedCallback)
        }
    }
}

async fn respond(stream: &mut TcpStream, status: &str, page: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        page.len(),
        page
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        warn!("write callback response: {}", e);
    }
    let _ = stream.shutdown().await;
}

/// Pull the `code` query parameter out of an HTTP request line like
/// `GET /callback?code=ABC123 HTTP/1.1`.
pub fn extract_code(request_line: &str) -> Option<String> {
    let target = request_line.split_whitespace().nth(1)?;
    let (_, query) = target.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == "code" && !v.is_empty() {
            Some(v.to_string())
        } else {
            None
        }
    })
}
