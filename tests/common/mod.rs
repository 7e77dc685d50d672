//! In-process stand-in for the chat backend: accepts one connection, records
//! the request, and answers with a close-delimited body written chunk by chunk.

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct Stub {
    pub base_url: String,
    pub request: JoinHandle<String>,
}

pub async fn serve_once(status: &'static str, chunks: Vec<Vec<u8>>) -> Stub {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let request = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let raw = read_request(&mut stream).await;

        let head = format!(
            "HTTP/1.1 {status}\r\n{}\r\nConnection: close\r\n\r\n",
            "Content-Type: text/plain; charset=utf-8"
        );
        stream.write_all(head.as_bytes()).await.expect("write head");
        stream.flush().await.expect("flush");
        for chunk in chunks {
            stream.write_all(&chunk).await.expect("write chunk");
            stream.flush().await.expect("flush");
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
        let _ = stream.shutdown().await;
        String::from_utf8_lossy(&raw).into_owned()
    });

    Stub {
        base_url: format!("http://{addr}"),
        request,
    }
}

/// Like [`serve_once`], but answers `responses.len()` connections in turn.
pub async fn serve_sequence(
    responses: Vec<(&'static str, Vec<Vec<u8>>)>,
) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status, chunks) in responses {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let raw = read_request(&mut stream).await;
            let head = format!("HTTP/1.1 {status}\r\nConnection: close\r\n\r\n");
            stream.write_all(head.as_bytes()).await.expect("write head");
            for chunk in chunks {
                stream.write_all(&chunk).await.expect("write chunk");
                stream.flush().await.expect("flush");
            }
            let _ = stream.shutdown().await;
            requests.push(String::from_utf8_lossy(&raw).into_owned());
        }
        requests
    });

    (format!("http://{addr}"), handle)
}

/// A port nothing listens on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut buf).await.expect("read");
        if n == 0 {
            return raw;
        }
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = find(&raw, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok());
    let chunked = head.contains("transfer-encoding: chunked");

    loop {
        let body = &raw[header_end..];
        let done = match content_length {
            Some(len) => body.len() >= len,
            None if chunked => body.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if done {
            return raw;
        }
        let n = stream.read(&mut buf).await.expect("read body");
        if n == 0 {
            return raw;
        }
        raw.extend_from_slice(&buf[..n]);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub fn record(role: &str, content: &str, ts: &str) -> String {
    serde_json::json!({"role": role, "content": content, "timestamp": ts}).to_string()
}
