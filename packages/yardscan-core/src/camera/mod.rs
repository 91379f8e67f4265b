//! Camera collaborator.
//!
//! Decoding is done by the reader hardware; this module only deals with
//! access permission and turning decoded text into decode events:
//! - `DeviceScanner`: serial/HID scanner exposed as a device node or file
//! - `LineScanner`: any async line source (pipes, tests)

mod device;

pub use device::{classify_open_error, DeviceScanner};

use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Decode events buffered between the reader task and the session
const DECODE_BUFFER: usize = 16;

/// Outcome of the one-time camera permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::Undetermined => write!(f, "undetermined"),
        }
    }
}

/// Raw text of one successful barcode read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeEvent {
    pub text: String,
}

impl DecodeEvent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A source of decoded barcode text.
pub trait Camera: Send + 'static {
    /// Ask for access to the reader. Called once before `start`.
    fn request_permission(&mut self) -> impl Future<Output = PermissionStatus> + Send;

    /// Begin delivering decode events. The stream ends when the reader goes away.
    fn start(self) -> mpsc::Receiver<DecodeEvent>;
}

/// Scanner reading one decoded code per line from any async reader
#[derive(Debug)]
pub struct LineScanner<R> {
    reader: R,
}

impl<R> LineScanner<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R> Camera for LineScanner<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn request_permission(&mut self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn start(self) -> mpsc::Receiver<DecodeEvent> {
        spawn_line_reader(self.reader)
    }
}

/// Forward every non-blank line of `reader` as a decode event.
///
/// Lines that are not valid UTF-8 are logged and skipped; only end of
/// stream or an I/O error stops the reader.
pub(crate) fn spawn_line_reader<R>(mut reader: R) -> mpsc::Receiver<DecodeEvent>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(DECODE_BUFFER);

    tokio::spawn(async move {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    tracing::debug!("Scanner input reached end of stream");
                    break;
                }
                Ok(_) => {
                    let text = match std::str::from_utf8(&buf) {
                        Ok(line) => line.trim(),
                        Err(e) => {
                            tracing::warn!("Discarding scanner read that is not UTF-8: {}", e);
                            continue;
                        }
                    };
                    if text.is_empty() {
                        continue;
                    }
                    tracing::debug!("Scanner read {} bytes", text.len());
                    if tx.send(DecodeEvent::new(text)).await.is_err() {
                        // session is gone
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read from scanner: {}", e);
                    break;
                }
            }
        }
    });

    rx
}
