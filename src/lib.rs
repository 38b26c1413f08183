//! # copilot-rpc
//!
//! JSON-RPC 2.0 client transport for the Copilot language-server subprocess.
//!
//! The crate implements the editor side of a length-prefixed stdio protocol:
//! outgoing requests and notifications are framed as
//! `Content-Length: <N>\r\n\r\n<json>`, inbound bytes are reassembled into
//! discrete JSON payloads regardless of how the OS pipe chunks them, and
//! responses are correlated back to their originating requests by id while
//! server-initiated notifications are routed to a registered handler.
//!
//! ## Architecture
//!
//! - **Frame codec** ([`protocol`]): encoding and a stateful decode buffer
//! - **Correlation table** ([`pending`]): pending requests awaiting results
//! - **RPC client** ([`client`]): id allocation, write path, inbound dispatch
//! - **Agent surface** ([`agent`]): typed wrappers for the Copilot method set
//!
//! ## Example
//!
//! ```ignore
//! use copilot_rpc::Client;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut child = tokio::process::Command::new("copilot-agent")
//!         .arg("--stdio")
//!         .stdin(std::process::Stdio::piped())
//!         .stdout(std::process::Stdio::piped())
//!         .spawn()?;
//!
//!     let client = Client::builder()
//!         .on_notification(|method, params| {
//!             tracing::info!(%method, %params, "server push");
//!         })
//!         .connect(child.stdout.take().unwrap(), child.stdin.take().unwrap());
//!
//!     let status = client.send_request("checkStatus", json!({})).await?;
//!     println!("status: {status}");
//!     client.wait_for_shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod error;
pub mod pending;
pub mod protocol;

mod client;
mod writer;

pub use client::{Client, ClientBuilder, ClientConfig, ClientHandle};
pub use error::{Result, RpcError};
