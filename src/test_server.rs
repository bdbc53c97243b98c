//! Throwaway HTTP server returning canned responses, for backend tests.

use std::io::ErrorKind;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One request as seen by the server: request line plus body.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub request_line: String,
    pub headers: String,
    pub body: String,
}

pub type SeenRequests = Arc<Mutex<Vec<SeenRequest>>>;

async fn read_request(socket: &mut TcpStream) -> Option<SeenRequest> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers = lines.collect::<Vec<_>>().join("\n");
    let body = String::from_utf8_lossy(&data[header_end..]).to_string();

    Some(SeenRequest {
        request_line,
        headers,
        body,
    })
}

/// Serve `responses` in order, one per connection. Returns `None` when the
/// sandbox does not allow binding a local port.
pub async fn start(responses: Vec<(&str, &str)>) -> Option<(String, SeenRequests)> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => return None,
        Err(e) => panic!("failed to bind test listener: {e}"),
    };

    let addr = listener.local_addr().expect("local_addr");
    let base_url = format!("http://{addr}");
    let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let responses: Vec<(String, String)> = responses
        .into_iter()
        .map(|(status, body)| (status.to_string(), body.to_string()))
        .collect();

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };

            if let Some(request) = read_request(&mut socket).await {
                seen_clone.lock().push(request);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {len}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{body}",
                len = body.len(),
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    Some((base_url, seen))
}
