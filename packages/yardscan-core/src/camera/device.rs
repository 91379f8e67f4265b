//! Scanner attached as a device node (e.g. `/dev/ttyACM0`) or a plain file.

use super::{spawn_line_reader, Camera, DecodeEvent, PermissionStatus};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::BufReader;
use tokio::sync::mpsc;

#[derive(Debug)]
pub struct DeviceScanner {
    path: PathBuf,
    file: Option<File>,
}

impl DeviceScanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Map a failed open to a permission status.
pub fn classify_open_error(err: &io::Error) -> PermissionStatus {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PermissionStatus::Denied,
        _ => PermissionStatus::Undetermined,
    }
}

impl Camera for DeviceScanner {
    async fn request_permission(&mut self) -> PermissionStatus {
        match File::open(&self.path).await {
            Ok(file) => {
                tracing::info!("Opened scanner device {:?}", self.path);
                self.file = Some(file);
                PermissionStatus::Granted
            }
            Err(e) => {
                let status = classify_open_error(&e);
                tracing::warn!(
                    "Cannot open scanner device {:?}: {} (permission {})",
                    self.path,
                    e,
                    status
                );
                status
            }
        }
    }

    fn start(self) -> mpsc::Receiver<DecodeEvent> {
        match self.file {
            Some(file) => spawn_line_reader(BufReader::new(file)),
            None => {
                tracing::warn!("Scanner {:?} started without access; no codes will be read", self.path);
                // sender dropped here, so the stream is closed from the start
                let (_tx, rx) = mpsc::channel(1);
                rx
            }
        }
    }
}
