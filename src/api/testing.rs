//! Minimal HTTP responder for exercising the client against a real socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A canned response
#[derive(Debug, Clone)]
pub struct Reply {
  pub status: u16,
  pub body: String,
  pub delay: Duration,
}

impl Reply {
  pub fn json(status: u16, body: &str) -> Self {
    Self {
      status,
      body: body.to_string(),
      delay: Duration::ZERO,
    }
  }

  pub fn delayed(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }
}

/// A request as seen by the stub
#[derive(Debug, Clone)]
pub struct Received {
  pub request_line: String,
  pub head: String,
  pub body: String,
}

pub struct StubServer {
  pub base_url: String,
  hits: Arc<AtomicUsize>,
  received: Arc<Mutex<Vec<Received>>>,
}

impl StubServer {
  /// Serve replies in order; the last reply repeats once the list is exhausted.
  pub async fn start(replies: Vec<Reply>) -> Self {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let received = Arc::new(Mutex::new(Vec::new()));

    let task_hits = hits.clone();
    let task_received = received.clone();
    tokio::spawn(async move {
      loop {
        let Ok((stream, _)) = listener.accept().await else {
          break;
        };
        let index = task_hits.fetch_add(1, Ordering::SeqCst);
        let reply = replies[index.min(replies.len() - 1)].clone();
        let received = task_received.clone();
        tokio::spawn(respond(stream, reply, received));
      }
    });

    Self {
      base_url: format!("http://{}", addr),
      hits,
      received,
    }
  }

  pub fn hits(&self) -> usize {
    self.hits.load(Ordering::SeqCst)
  }

  pub fn received(&self) -> Vec<Received> {
    self.received.lock().unwrap().clone()
  }
}

async fn respond(mut stream: TcpStream, reply: Reply, received: Arc<Mutex<Vec<Received>>>) {
  let mut buf = Vec::new();
  let mut chunk = [0u8; 4096];

  let header_end = loop {
    let Ok(n) = stream.read(&mut chunk).await else {
      return;
    };
    if n == 0 {
      return;
    }
    buf.extend_from_slice(&chunk[..n]);
    if let Some(pos) = find(&buf, b"\r\n\r\n") {
      break pos + 4;
    }
  };

  let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
  let content_length = head
    .lines()
    .filter_map(|line| line.split_once(':'))
    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
    .unwrap_or(0);

  while buf.len() < header_end + content_length {
    let Ok(n) = stream.read(&mut chunk).await else {
      return;
    };
    if n == 0 {
      break;
    }
    buf.extend_from_slice(&chunk[..n]);
  }

  received.lock().unwrap().push(Received {
    request_line: head.lines().next().unwrap_or_default().to_string(),
    head: head.to_ascii_lowercase(),
    body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
  });

  if !reply.delay.is_zero() {
    tokio::time::sleep(reply.delay).await;
  }

  let response = format!(
    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
    reply.status,
    reply.body.len(),
    reply.body
  );
  let _ = stream.write_all(response.as_bytes()).await;
  let _ = stream.shutdown().await;
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
  haystack.windows(needle.len()).position(|w| w == needle)
}
