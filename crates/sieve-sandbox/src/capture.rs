//! Bounded stream capture
//!
//! Output is appended with a size check on every chunk, so memory per stream
//! never exceeds the cap no matter what the process writes. Crossing the cap
//! fires a shared `Notify` that the executor races against exit and timeout.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 8 * 1024;

/// Byte accumulator with a hard ceiling
#[derive(Debug)]
pub struct BoundedBuffer {
    data: Vec<u8>,
    cap: usize,
    overflowed: bool,
}

impl BoundedBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            data: Vec::new(),
            cap,
            overflowed: false,
        }
    }

    /// Append a chunk. Returns `false` once the cap has been crossed; only
    /// the bytes that fit are kept.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        if self.overflowed {
            return false;
        }
        let room = self.cap - self.data.len();
        if chunk.len() > room {
            self.data.extend_from_slice(&chunk[..room]);
            self.overflowed = true;
            return false;
        }
        self.data.extend_from_slice(chunk);
        true
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Lossy UTF-8 view of what was captured
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// A capture running on its own task.
///
/// The buffer is shared so the executor can still read whatever arrived if it
/// has to abandon the reader (a grandchild holding the pipe open).
pub struct StreamCapture {
    buffer: Arc<Mutex<BoundedBuffer>>,
    handle: JoinHandle<()>,
}

impl StreamCapture {
    /// Start draining `reader` into a buffer of `cap` bytes
    pub fn spawn<R>(reader: R, cap: usize, limit_hit: Arc<Notify>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(BoundedBuffer::new(cap)));
        let shared = Arc::clone(&buffer);
        let handle = tokio::spawn(drain(reader, shared, limit_hit));
        Self { buffer, handle }
    }

    /// Wait up to `grace` for EOF, then return the captured text and whether
    /// the cap was crossed
    pub async fn finish(self, grace: std::time::Duration) -> (String, bool) {
        let Self { buffer, mut handle } = self;
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            tracing::debug!("Output reader still open after grace period, abandoning");
            handle.abort();
        }
        let guard = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (guard.to_string_lossy(), guard.overflowed())
    }
}

async fn drain<R>(mut reader: R, buffer: Arc<Mutex<BoundedBuffer>>, limit_hit: Arc<Notify>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "Output stream read failed");
                break;
            }
        };
        let within_cap = {
            let mut guard = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.push(&chunk[..n])
        };
        if !within_cap {
            limit_hit.notify_one();
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_push_within_cap() {
        let mut buf = BoundedBuffer::new(10);
        assert!(buf.push(b"hello"));
        assert!(buf.push(b"world"));
        assert_eq!(buf.len(), 10);
        assert!(!buf.overflowed());
        assert_eq!(buf.to_string_lossy(), "helloworld");
    }

    #[test]
    fn test_push_crossing_cap_keeps_prefix() {
        let mut buf = BoundedBuffer::new(8);
        assert!(buf.push(b"abcde"));
        assert!(!buf.push(b"fghij"));
        assert!(buf.overflowed());
        assert_eq!(buf.to_string_lossy(), "abcdefgh");
        assert!(!buf.push(b"more"));
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_zero_cap() {
        let mut buf = BoundedBuffer::new(0);
        assert!(buf.push(b""));
        assert!(buf.is_empty());
        assert!(!buf.push(b"x"));
        assert!(buf.overflowed());
    }

    #[tokio::test]
    async fn test_capture_under_cap() {
        let limit = Arc::new(Notify::new());
        let capture = StreamCapture::spawn(&b"line one\nline two\n"[..], 1024, limit);
        let (text, overflowed) = capture.finish(Duration::from_secs(1)).await;
        assert_eq!(text, "line one\nline two\n");
        assert!(!overflowed);
    }

    #[tokio::test]
    async fn test_capture_over_cap_notifies() {
        let limit = Arc::new(Notify::new());
        let data = vec![b'x'; 64 * 1024];
        let capture = StreamCapture::spawn(std::io::Cursor::new(data), 1000, Arc::clone(&limit));

        tokio::time::timeout(Duration::from_secs(1), limit.notified())
            .await
            .expect("limit notification");

        let (text, overflowed) = capture.finish(Duration::from_secs(1)).await;
        assert!(overflowed);
        assert_eq!(text.len(), 1000);
    }
}
