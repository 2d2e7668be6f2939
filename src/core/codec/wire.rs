//! Wire message shapes exchanged with the client.
//!
//! Server-to-client traffic is tagged by `event`; optional client control
//! messages are tagged by `type`.

use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};

use crate::core::session::RoutingTarget;

/// Event-tagged wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WireEvent {
    /// Base64-encoded PCM16LE mono audio at the session's target rate.
    Media { data: String },
    /// The user began speaking; queued playback must be discarded.
    Stop,
    /// Display-channel push with a JSON-encoded result payload.
    KnowledgeBase { data: String },
    /// Display-channel notice that a lookup has started.
    KbProcessing { data: String },
}

impl WireEvent {
    /// Wrap raw PCM bytes in a media event without any audio checks.
    pub fn media_from_pcm(pcm: &[u8]) -> Self {
        WireEvent::Media {
            data: BASE64_STANDARD.encode(pcm),
        }
    }

    /// Serialize to the text frame sent on the socket.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Type-tagged control messages a client may send alongside audio.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Out-of-band session configuration.
    Config(SessionConfigMessage),
    /// Liveness probe.
    Ping,
}

/// Routing configuration sent by the client after connecting.
///
/// Both the plain and the `bedrock`-prefixed identifier names are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionConfigMessage {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, rename = "agentId", alias = "bedrockAgentId")]
    pub agent_id: Option<String>,
    #[serde(default, rename = "agentAliasId", alias = "bedrockAgentAliasId")]
    pub agent_alias_id: Option<String>,
}

impl SessionConfigMessage {
    /// The routing target this message describes, if both identifiers are present.
    pub fn routing_target(&self) -> Option<RoutingTarget> {
        let agent_id = self.agent_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let alias_id = self
            .agent_alias_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;

        Some(RoutingTarget {
            agent_id: agent_id.to_string(),
            agent_alias_id: alias_id.to_string(),
            region: self.region.clone().filter(|r| !r.is_empty()),
        })
    }
}
