//! WebSocket Message Types
//!
//! Every frame is `{"op": u8, "d": payload, "s": seq, "t": name}`. Only
//! dispatches carry `s` and `t`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Server -> client event
    Dispatch = 0,
    /// Client keepalive
    Heartbeat = 1,
    /// Client presents its capability token
    Identify = 2,
    /// Client joins a broker channel
    Subscribe = 3,
    /// Client leaves a broker channel
    Unsubscribe = 4,
    /// Server rejects the session; the client must reconnect
    InvalidSession = 9,
    /// First server frame, carries the heartbeat interval
    Hello = 10,
    /// Heartbeat acknowledgement
    HeartbeatAck = 11,
}

impl OpCode {
    pub fn from_u8(op: u8) -> Option<Self> {
        match op {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            3 => Some(Self::Subscribe),
            4 => Some(Self::Unsubscribe),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }
}

/// Dispatch names emitted by the gateway itself
pub mod dispatch {
    pub const READY: &str = "READY";
    pub const SUBSCRIBED: &str = "SUBSCRIBED";
    pub const UNSUBSCRIBED: &str = "UNSUBSCRIBED";
    pub const SUBSCRIBE_FAILED: &str = "SUBSCRIBE_FAILED";
}

/// Incoming gateway message
#[derive(Debug, Deserialize)]
pub struct GatewayReceive {
    pub op: u8,
    #[serde(default)]
    pub d: Option<Value>,
}

impl GatewayReceive {
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_u8(self.op)
    }

    /// Deserialize `d` into a typed payload.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.d
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }
}

/// Outgoing gateway message
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySend {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewaySend {
    fn control(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op: op as u8,
            d,
            s: None,
            t: None,
        }
    }

    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::control(
            OpCode::Hello,
            serde_json::to_value(HelloPayload { heartbeat_interval }).ok(),
        )
    }

    pub fn heartbeat_ack() -> Self {
        Self::control(OpCode::HeartbeatAck, None)
    }

    pub fn invalid_session(reason: &str) -> Self {
        Self::control(
            OpCode::InvalidSession,
            Some(serde_json::json!({ "reason": reason })),
        )
    }

    pub fn dispatch(name: impl Into<String>, sequence: u64, d: Value) -> Self {
        Self {
            op: OpCode::Dispatch as u8,
            d: Some(d),
            s: Some(sequence),
            t: Some(name.into()),
        }
    }
}

/// Hello payload (op 10)
#[derive(Debug, Serialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

/// Identify payload (op 2)
#[derive(Debug, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
}

/// Subscribe / Unsubscribe payload (op 3 / op 4)
#[derive(Debug, Deserialize)]
pub struct SubscribePayload {
    pub channel: String,
}

/// Ready payload (dispatch READY)
#[derive(Debug, Serialize)]
pub struct ReadyPayload {
    pub session_id: String,
    pub user_id: String,
    /// Channels granted explicitly by the token
    pub channels: Vec<String>,
    /// Unix seconds after which the session is closed
    pub expires_at: i64,
}
