//! Yardscan Core Library
//!
//! This crate provides the core functionality for Yardscan front ends:
//! - Capture sessions pairing a vehicle scan with a location scan
//! - Scanner input (device nodes, keyboard wedges, any line source)
//! - Submission of scan pairs to the collection endpoint
//!
//! # Example
//!
//! ```no_run
//! use yardscan_core::{camera, cloud, notice, session};
//!
//! struct Stdout;
//!
//! impl notice::Notifier for Stdout {
//!     fn show(&self, notice: &notice::Notice) {
//!         println!("{}\n{}", notice.title, notice.body);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let endpoint = cloud::load_endpoint_config(None);
//!     let client = cloud::CloudClient::new(&endpoint);
//!
//!     let (users, user_events) = tokio::sync::mpsc::channel(8);
//!     users.send(session::UserEvent::RequestScan(yardscan_core::Slot::A)).await.unwrap();
//!
//!     let scanner = camera::DeviceScanner::new("/dev/ttyACM0");
//!     let (end, state) = session::Session::new(client, Stdout)
//!         .run(scanner, user_events)
//!         .await;
//!     println!("{:?}, vehicle scanned: {}", end, state.scan_a.is_some());
//! }
//! ```

pub mod camera;
pub mod cloud;
pub mod notice;
pub mod scan;
pub mod session;

// Re-export commonly used types
pub use camera::{Camera, DecodeEvent, DeviceScanner, LineScanner, PermissionStatus};
pub use cloud::{CloudClient, ConfigSource, EndpointConfig, SubmitError, SubmitRequest, Submitter};
pub use notice::{Notice, NoticeKind, Notifier};
pub use scan::{CombinedDocument, Payload, PayloadError, ScanResult, Slot};
pub use session::{Mode, Session, SessionController, SessionEnd, SessionState, UserEvent};
