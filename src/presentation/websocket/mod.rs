//! WebSocket Gateway
//!
//! Delivers broker events to browser clients over a websocket.

pub mod bridge;
pub mod gateway;
pub mod handler;
pub mod messages;
pub mod session;

pub use bridge::run_broker_bridge;
pub use gateway::{ConnectedSession, Gateway};
pub use handler::ws_handler;
pub use messages::{GatewayReceive, GatewaySend, OpCode};
pub use session::SessionState;
