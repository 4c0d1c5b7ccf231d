//! Rich presence activity model.
//!
//! Activities arrive from RPC clients as snake_case JSON inside
//! `SET_ACTIVITY` frames and are forwarded, normalized, to the presence
//! sink. Normalization fills the defaults the rendering surface expects
//! (`name`, `type`, `created_at`), backfills `application_id` from the
//! session's client id, and derives `flags` from `instance` — the client's
//! own `flags` value is never trusted.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Sentinel name used when a client omits the activity name.
pub const UNKNOWN_ACTIVITY_NAME: &str = "Unknown Activity";

/// A rich presence record pushed by a connected client.
///
/// All fields are optional on the wire; [`Activity::normalize`] fills the
/// required ones before the record reaches the presence sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Display name of the activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Activity type (0 = playing, 1 = streaming, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<i64>,

    /// Stream URL for streaming activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Unix millisecond timestamp of when the activity started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,

    /// Elapsed/remaining time markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,

    /// Application id; backfilled from the session's client id when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,

    /// First detail line under the activity name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Second detail line (party status etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Emoji attached to a custom status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Emoji>,

    /// Party the player is in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<Party>,

    /// Artwork shown next to the activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Assets>,

    /// Up to two clickable buttons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,

    /// Join/spectate secrets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Secrets>,

    /// Whether this is an instanced game session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<bool>,

    /// Derived from `instance` during normalization; never read from the
    /// client.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub flags: Option<i64>,
}

/// Start/end timestamps in Unix milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Activity start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Activity end time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

/// Emoji attached to a custom status activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    /// Emoji name or unicode literal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Custom emoji id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Whether the custom emoji is animated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
}

/// Party membership info.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Party id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `[current, max]` party size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec<i64>>,
}

/// Large/small artwork keys and hover texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    /// Large image asset key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    /// Large image hover text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    /// Small image asset key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    /// Small image hover text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

/// A clickable button under the activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Button label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Target URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Join/spectate/match secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secrets {
    /// Secret for joining the party.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    /// Secret for spectating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectate: Option<String>,
    /// Secret for the specific match instance.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_secret: Option<String>,
}

impl Activity {
    /// Fill required defaults and derived fields before the activity is
    /// handed to the presence sink.
    ///
    /// - `name` falls back to [`UNKNOWN_ACTIVITY_NAME`]
    /// - `type` falls back to 0
    /// - `created_at` falls back to the current time
    /// - `application_id` is backfilled from the session's client id
    /// - `flags` is 1 when `instance` is true, otherwise 0
    pub fn normalize(&mut self, fallback_application_id: Option<&str>) {
        if self.name.is_none() {
            self.name = Some(UNKNOWN_ACTIVITY_NAME.to_string());
        }
        if self.activity_type.is_none() {
            self.activity_type = Some(0);
        }
        if self.created_at.is_none() {
            self.created_at = Some(Utc::now().timestamp_millis());
        }
        if self.application_id.is_none() {
            self.application_id = fallback_application_id.map(str::to_string);
        }
        self.flags = Some(i64::from(self.instance == Some(true)));
    }
}
