//! Console Session - client side of a remote interactive console
//!
//! This crate implements everything between the WebSocket and the screen
//! except the screen itself: the JSON session protocol, a reconnecting
//! transport, the turn-taking state machine, the render surface of output
//! lines and the masked/unmasked prompt editor. It does no terminal I/O; a
//! front end drives a [`Session`] and draws its [`RenderSurface`].
//!
//! # Example
//!
//! ```no_run
//! use console_session::{
//!     ClientMetadata, ControllerConfig, Session, SessionConfig, TransportConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let url = console_session::endpoint::resolve(None, Some("http://localhost:8765")).unwrap();
//!     let mut session = Session::start(SessionConfig {
//!         transport: TransportConfig::new(url.as_str()),
//!         controller: ControllerConfig::new(ClientMetadata::detect("console", "0.1.0")),
//!     });
//!
//!     while let Some(event) = session.recv().await {
//!         session.apply(event);
//!
//!         if let Some(capture) = session.controller_mut().pending_mut() {
//!             capture.insert_str("guest");
//!             session.submit();
//!         }
//!
//!         for line in session.controller().surface().lines() {
//!             println!("{}", console_session::markup::plain_text(&line.content));
//!         }
//!     }
//! }
//! ```

pub mod controller;
pub mod endpoint;
mod error;
pub mod input_line;
pub mod markup;
pub mod protocol;
mod session;
pub mod surface;
pub mod transport;

pub use controller::{ConnectionState, ControllerConfig, Outgoing, Phase, SessionController};
pub use error::{DecodeError, EndpointError, TransportError};
pub use input_line::{Focus, InputCapture};
pub use protocol::{ClientMessage, ClientMetadata, ServerMessage};
pub use session::{Session, SessionConfig};
pub use surface::{DisplayLine, LineHandle, RenderSurface};
pub use transport::{ConnectionId, TransportConfig, TransportEvent, TransportHandle, TransportManager};
