//! Chat Transports
//!
//! The controller talks to the chat server through the [`ChatTransport`]
//! trait, so tests and alternative wires can stand in for HTTP.
//!
//! # Available Transports
//!
//! - **SSE**: JSON `POST`, Server-Sent Events response (default)
//!
//! # Usage
//!
//! ```ignore
//! use thoughtchain_core::transport::{ChatRequest, ChatTransport, SseTransport};
//!
//! let transport = SseTransport::from_config(&ChatConfig::default())?;
//! let mut stream = transport.open(&ChatRequest::new("thread-1", "Hello")).await?;
//! while let Some(event) = stream.recv().await { /* ... */ }
//! ```

mod sse;
mod traits;

pub use sse::SseTransport;
pub use traits::{ChatRequest, ChatTransport, TransportStream};
