//! Forwarding parameters and session tokens
//!
//! The same [`ForwardingParameters`] value feeds both the control-plane
//! session request and the helper's command line, so the port values in the
//! two representations cannot drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::TargetId;

/// Document the control plane runs to forward a port
pub const DOCUMENT_NAME: &str = "AWS-StartPortForwardingSession";

/// Action argument the helper expects
pub const HELPER_ACTION: &str = "StartSession";

/// Parameter key for the remote port
pub const REMOTE_PORT_KEY: &str = "portNumber";

/// Parameter key for the local port
pub const LOCAL_PORT_KEY: &str = "localPortNumber";

/// Structured parameters of one forwarding session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingParameters {
    #[serde(rename = "Target")]
    pub target: TargetId,
    #[serde(rename = "DocumentName")]
    pub document_name: String,
    #[serde(rename = "Parameters")]
    pub parameters: PortParameters,
}

/// Port pair carried in the `Parameters` object
///
/// Ports travel as single-element string arrays on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortParameters {
    #[serde(rename = "portNumber", with = "port_list")]
    pub remote_port: u16,
    #[serde(rename = "localPortNumber", with = "port_list")]
    pub local_port: u16,
}

impl ForwardingParameters {
    /// Build parameters for forwarding `local_port` to `remote_port` on `target`
    pub fn new(target: TargetId, remote_port: u16, local_port: u16) -> Self {
        Self {
            target,
            document_name: DOCUMENT_NAME.to_string(),
            parameters: PortParameters {
                remote_port,
                local_port,
            },
        }
    }

    pub fn remote_port(&self) -> u16 {
        self.parameters.remote_port
    }

    pub fn local_port(&self) -> u16 {
        self.parameters.local_port
    }

    /// Encode as the JSON document handed to the helper
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a JSON document produced by [`ForwardingParameters::to_json`]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Key/value pairs for the control-plane session request
    pub fn request_parameters(&self) -> Vec<(String, Vec<String>)> {
        vec![
            (
                REMOTE_PORT_KEY.to_string(),
                vec![self.parameters.remote_port.to_string()],
            ),
            (
                LOCAL_PORT_KEY.to_string(),
                vec![self.parameters.local_port.to_string()],
            ),
        ]
    }
}

/// Short-lived credentials returned by the control plane for one session
///
/// Opaque to everything except the helper process, which receives it as JSON.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    #[serde(rename = "SessionId")]
    pub session_id: String,
    #[serde(rename = "TokenValue")]
    pub token_value: String,
    #[serde(rename = "StreamUrl")]
    pub stream_url: String,
}

impl TokenBundle {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBundle")
            .field("session_id", &self.session_id)
            .field("token_value", &"<redacted>")
            .field("stream_url", &self.stream_url)
            .finish()
    }
}

mod port_list {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(port: &u16, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq([port.to_string()])
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u16, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<String>::deserialize(deserializer)?;
        match values.as_slice() {
            [single] => single
                .parse()
                .map_err(|e| D::Error::custom(format!("invalid port {:?}: {}", single, e))),
            _ => Err(D::Error::custom(format!(
                "expected exactly one port, got {}",
                values.len()
            ))),
        }
    }
}
