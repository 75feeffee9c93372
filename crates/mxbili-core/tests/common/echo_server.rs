//! Minimal HTTP/1.1 upstreams for integration tests.
//!
//! `start_echo` answers every request with a plain-text summary of what it
//! received (request line plus the headers the proxy rewrites).
//! `start_scripted` replays a fixed list of responses, repeating the last one.
//! `raw_get` talks to the proxy over a bare socket so tests can send
//! absolute-form targets.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Headers reflected back by the echo server, in this order.
const ECHOED: [&str; 4] = ["cookie", "referer", "origin", "user-agent"];

/// Starts an echo upstream in a background thread. Returns its port.
pub fn start_echo() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || handle_echo(stream));
        }
    });
    port
}

/// Starts an upstream that answers request N with `responses[N]` (status,
/// JSON body), then keeps repeating the last entry. Returns the base URL and
/// a counter of requests served.
pub fn start_scripted(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let responses = Arc::new(responses);
    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            if read_head(&mut stream).is_none() {
                continue;
            }
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let (status, body) = responses
                .get(n)
                .or_else(|| responses.last())
                .cloned()
                .unwrap_or((500, String::new()));
            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    (format!("http://127.0.0.1:{}", port), hits)
}

/// Reads until the end of the request head.
fn read_head(stream: &mut TcpStream) -> Option<String> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8(buf).ok()
}

fn handle_echo(mut stream: TcpStream) {
    let Some(head) = read_head(&mut stream) else {
        return;
    };
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or("").to_string();
    let mut seen: Vec<(String, String)> = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            seen.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    let mut body = format!("request: {}\n", request_line);
    for name in ECHOED {
        let value = seen
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("-");
        body.push_str(&format!("{}: {}\n", name, value));
    }
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

/// Value the echo server reported for `name` ("-" when absent).
pub fn echoed<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    body.lines()
        .find_map(|l| l.strip_prefix(name).and_then(|r| r.strip_prefix(": ")))
}

/// Sends `GET <target>` to the proxy on `port` with the given extra header
/// lines and returns (status, body).
pub fn raw_get(port: u16, target: &str, extra_headers: &[&str]) -> (u16, String) {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect to proxy");
    let _ = stream.set_read_timeout(Some(Duration::from_secs(10)));
    let mut request = format!("GET {} HTTP/1.1\r\nHost: 127.0.0.1:{}\r\n", target, port);
    for h in extra_headers {
        request.push_str(h);
        request.push_str("\r\n");
    }
    request.push_str("Connection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).expect("write request");

    let mut raw = Vec::new();
    let _ = stream.read_to_end(&mut raw);
    let text = String::from_utf8_lossy(&raw).into_owned();
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((text.as_str(), ""));
    let status = head
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let chunked = head
        .lines()
        .any(|l| l.to_ascii_lowercase().starts_with("transfer-encoding:") && l.to_ascii_lowercase().contains("chunked"));
    let body = if chunked { dechunk(body) } else { body.to_string() };
    (status, body)
}

fn dechunk(mut rest: &str) -> String {
    let mut out = String::new();
    while let Some((size_line, after)) = rest.split_once("\r\n") {
        let size = usize::from_str_radix(size_line.trim(), 16).unwrap_or(0);
        if size == 0 || after.len() < size {
            break;
        }
        out.push_str(&after[..size]);
        rest = after[size..].trim_start_matches("\r\n");
    }
    out
}

/// One persistent client connection to the proxy, for checking that a
/// connection survives between requests.
pub struct KeepAliveConn {
    stream: TcpStream,
    port: u16,
}

impl KeepAliveConn {
    pub fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect to proxy");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(10)));
        Self { stream, port }
    }

    /// Sends `GET <target>` without closing the connection and reads exactly
    /// one response. Fails if the proxy closed the socket.
    pub fn get(&mut self, target: &str) -> std::io::Result<(u16, String)> {
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nConnection: keep-alive\r\n\r\n",
            target, self.port
        );
        self.stream.write_all(request.as_bytes())?;

        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        while !buf.ends_with(b"\r\n\r\n") {
            if self.stream.read(&mut byte)? == 0 {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            buf.push(byte[0]);
        }
        let head = String::from_utf8_lossy(&buf).into_owned();
        let status = head
            .lines()
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let header = |name: &str| {
            head.lines().find_map(|l| {
                let (n, v) = l.split_once(':')?;
                n.trim().eq_ignore_ascii_case(name).then(|| v.trim().to_string())
            })
        };
        let body = if let Some(len) = header("content-length").and_then(|v| v.parse::<usize>().ok()) {
            let mut body = vec![0u8; len];
            self.stream.read_exact(&mut body)?;
            body
        } else {
            // chunked: read until the terminating zero-size chunk
            let mut raw = Vec::new();
            while !raw.ends_with(b"0\r\n\r\n") {
                if self.stream.read(&mut byte)? == 0 {
                    return Err(std::io::ErrorKind::UnexpectedEof.into());
                }
                raw.push(byte[0]);
            }
            dechunk(&String::from_utf8_lossy(&raw)).into_bytes()
        };
        Ok((status, String::from_utf8_lossy(&body).into_owned()))
    }
}
