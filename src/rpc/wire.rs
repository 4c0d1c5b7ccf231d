//! Typed payloads and response envelopes for the IPC protocol.
//!
//! Inbound payloads are decoded into the structs here rather than browsed as
//! ad hoc JSON dictionaries; the command set is a closed sum type with an
//! explicit [`FrameCommand::Unknown`] variant carrying the raw `cmd` string.
//! Outbound envelopes (handshake ack, READY dispatch, success/error replies,
//! close frames) are built by the helpers at the bottom of this module.

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::rpc::activity::Activity;

/// Error code used in command-level error envelopes.
///
/// The reference server reports every command argument failure under this
/// one code, with the offending detail in the message string.
pub const INVALID_INVITE_ERROR_CODE: i32 = 4011;

/// Closure and error codes sent in close frames.
///
/// Two families: WebSocket-style closure codes (1000-range) and RPC error
/// codes (4000-range). Each carries a fixed description used as the default
/// close message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// 1000 — clean close requested by the peer.
    Normal,
    /// 1003 — peer sent something the bridge does not support.
    Unsupported,
    /// 1006 — protocol violated, e.g. a frame before the handshake.
    Abnormal,
    /// 4000 — handshake carried an empty or missing client id.
    InvalidClientId,
    /// 4001 — request origin rejected.
    InvalidOrigin,
    /// 4002 — generic malformed-traffic signal.
    RateLimited,
    /// 4003 — client token no longer valid.
    TokenRevoked,
    /// 4004 — handshake protocol version is not supported.
    InvalidVersion,
    /// 4005 — payload could not be decoded.
    InvalidEncoding,
}

impl ResponseCode {
    /// Numeric code written into the close frame.
    pub fn code(self) -> i32 {
        match self {
            Self::Normal => 1000,
            Self::Unsupported => 1003,
            Self::Abnormal => 1006,
            Self::InvalidClientId => 4000,
            Self::InvalidOrigin => 4001,
            Self::RateLimited => 4002,
            Self::TokenRevoked => 4003,
            Self::InvalidVersion => 4004,
            Self::InvalidEncoding => 4005,
        }
    }

    /// Human-readable description of the code.
    pub fn description(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Unsupported => "Unsupported",
            Self::Abnormal => "Abnormal",
            Self::InvalidClientId => "Invalid Client ID",
            Self::InvalidOrigin => "Invalid Origin",
            Self::RateLimited => "Rate Limited",
            Self::TokenRevoked => "Token Revoked",
            Self::InvalidVersion => "Invalid Version",
            Self::InvalidEncoding => "Invalid Encoding",
        }
    }

    /// Whether this is a 1000-range closure code rather than an error code.
    pub fn is_closure(self) -> bool {
        matches!(self, Self::Normal | Self::Unsupported | Self::Abnormal)
    }

    /// Default close message when the caller supplies none.
    pub fn default_message(self) -> String {
        if self.is_closure() {
            format!("{} closure", self.description())
        } else {
            self.description().to_string()
        }
    }
}

/// Handshake payload (client → server).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HandshakePayload {
    /// Protocol version. Historically sent as either a number or a numeric
    /// string; anything non-numeric decodes to `None` and is rejected as an
    /// invalid version rather than an encoding failure.
    #[serde(default, deserialize_with = "lenient_version")]
    pub v: Option<i64>,
    /// Application id of the connecting client.
    #[serde(default)]
    pub client_id: Option<String>,
}

fn lenient_version<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

/// Command carried by a post-handshake frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FrameCommand {
    /// Push or update the client's rich presence.
    SetActivity,
    /// Open an invite code in the browser.
    InviteBrowser,
    /// Open a guild template code in the browser.
    GuildTemplateBrowser,
    /// Deep link into the running client.
    DeepLink,
    /// Connections OAuth callback; not handled by the bridge.
    ConnectionsCallback,
    /// Any command string the bridge has no handler for.
    Unknown(String),
}

impl From<String> for FrameCommand {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "SET_ACTIVITY" => Self::SetActivity,
            "INVITE_BROWSER" => Self::InviteBrowser,
            "GUILD_TEMPLATE_BROWSER" => Self::GuildTemplateBrowser,
            "DEEP_LINK" => Self::DeepLink,
            "CONNECTIONS_CALLBACK" => Self::ConnectionsCallback,
            _ => Self::Unknown(raw),
        }
    }
}

impl FrameCommand {
    /// Wire name, echoed back in response envelopes.
    pub fn as_str(&self) -> &str {
        match self {
            Self::SetActivity => "SET_ACTIVITY",
            Self::InviteBrowser => "INVITE_BROWSER",
            Self::GuildTemplateBrowser => "GUILD_TEMPLATE_BROWSER",
            Self::DeepLink => "DEEP_LINK",
            Self::ConnectionsCallback => "CONNECTIONS_CALLBACK",
            Self::Unknown(raw) => raw,
        }
    }
}

/// Frame payload (client → server).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FramePayload {
    /// Command to dispatch; a frame without one is logged and ignored.
    #[serde(default)]
    pub cmd: Option<FrameCommand>,
    /// Client-chosen correlation token echoed in the response.
    #[serde(default)]
    pub nonce: Option<String>,
    /// Command arguments.
    #[serde(default)]
    pub args: Option<FrameArgs>,
}

/// Arguments block of a frame payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameArgs {
    /// Process id of the client application.
    #[serde(default)]
    pub pid: Option<i64>,
    /// Activity to push (SET_ACTIVITY).
    #[serde(default)]
    pub activity: Option<Activity>,
    /// Invite or template code (INVITE_BROWSER / GUILD_TEMPLATE_BROWSER).
    #[serde(default)]
    pub code: Option<String>,
    /// Nested nonce some clients place inside `args`.
    #[serde(default)]
    pub nonce: Option<String>,
}

/// Ping payload (client → server); the nonce is echoed in the pong.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PingPayload {
    /// Optional correlation token.
    #[serde(default)]
    pub nonce: Option<String>,
}

// ============================================================================
// Outbound envelopes
// ============================================================================

const CDN_HOST: &str = "cdn.discordapp.com";
const API_ENDPOINT: &str = "//discord.com/api";
const RPC_ENVIRONMENT: &str = "production";

// Synthetic user presented to RPC clients in the READY dispatch. Clients only
// use it to confirm a desktop client is present; the values are the ones the
// arRPC bridge family reports.
const BRIDGE_USER_ID: &str = "1045800378228281345";
const BRIDGE_USER_NAME: &str = "arrpc";
const BRIDGE_USER_GLOBAL_NAME: &str = "arRPC";
const BRIDGE_USER_AVATAR: &str = "cfefa4d9839fb4bdf030f91c2a13e95c";

/// Handshake acknowledgment payload (op 0).
pub fn handshake_ack(client_id: &str) -> Value {
    json!({
        "v": crate::constants::IPC_VERSION,
        "client_id": client_id,
    })
}

/// Synthetic READY dispatch (op 1) sent right after the handshake ack.
pub fn ready_dispatch() -> Value {
    json!({
        "cmd": "DISPATCH",
        "evt": "READY",
        "nonce": null,
        "data": {
            "v": crate::constants::IPC_VERSION,
            "config": {
                "cdn_host": CDN_HOST,
                "api_endpoint": API_ENDPOINT,
                "environment": RPC_ENVIRONMENT,
            },
            "user": {
                "id": BRIDGE_USER_ID,
                "username": BRIDGE_USER_NAME,
                "discriminator": "0",
                "global_name": BRIDGE_USER_GLOBAL_NAME,
                "avatar": BRIDGE_USER_AVATAR,
                "bot": false,
                "flags": 0,
            },
        },
    })
}

/// Success envelope for a frame command.
///
/// The nonce key is present only when the request carried one.
pub fn success_envelope(cmd: &str, nonce: Option<&str>) -> Value {
    let mut envelope = json!({
        "cmd": cmd,
        "evt": null,
        "data": null,
    });
    if let Some(nonce) = nonce {
        envelope["nonce"] = json!(nonce);
    }
    envelope
}

/// Error envelope for a frame command.
pub fn error_envelope(cmd: &str, code: &str, nonce: Option<&str>) -> Value {
    json!({
        "cmd": cmd,
        "evt": "ERROR",
        "data": {
            "code": INVALID_INVITE_ERROR_CODE,
            "message": format!("Invalid invite or template id: {code}"),
        },
        "nonce": nonce,
    })
}

/// Pong payload (op 4) echoing the ping nonce.
pub fn pong_payload(nonce: Option<&str>) -> Value {
    json!({ "nonce": nonce })
}

/// Close frame payload (op 2).
pub fn close_payload(code: i32, message: &str) -> Value {
    json!({
        "code": code,
        "message": message,
    })
}

/// Server-generated nonce for error replies that must not reuse the
/// client's request nonce.
pub fn fresh_nonce() -> String {
    uuid::Uuid::new_v4().to_string()
}
