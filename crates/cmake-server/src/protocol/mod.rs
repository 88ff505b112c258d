//! Message envelopes exchanged with the CMake server.
//!
//! Outbound requests are JSON objects carrying a `type` naming the verb and a
//! `cookie` used to correlate the reply. Inbound messages are classified by
//! their `type` into [`ServerMessage`].

mod types;

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::ProtocolError;

pub use types::{
    BuildFiles, CMakeCache, CMakeInputs, CacheEntry, CodeModel, Configuration, FileGroup,
    FileSystemWatchers, GlobalSettings, HandshakeParams, IncludePath, ProgressData, Project,
    ProtocolVersion, Target,
};
pub(crate) use types::HandshakeRequest;

/// Name of the signal carrying file-change notifications.
pub const FILE_CHANGE_SIGNAL: &str = "fileChange";

/// Requests understood by the CMake server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Protocol selection and project directories.
    Handshake,
    /// Reads the global settings.
    GlobalSettings,
    /// Changes global settings.
    SetGlobalSettings,
    /// Runs the configure step.
    Configure,
    /// Runs the generate step.
    Compute,
    /// Fetches the code model.
    CodeModel,
    /// Fetches the files CMake read while configuring.
    CMakeInputs,
    /// Fetches the cache contents.
    Cache,
    /// Fetches the files and directories the server is watching.
    FileSystemWatchers,
}

impl RequestKind {
    /// The value of the `type` field for this request.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::GlobalSettings => "globalSettings",
            Self::SetGlobalSettings => "setGlobalSettings",
            Self::Configure => "configure",
            Self::Compute => "compute",
            Self::CodeModel => "codemodel",
            Self::CMakeInputs => "cmakeInputs",
            Self::Cache => "cache",
            Self::FileSystemWatchers => "fileSystemWatchers",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A decoded message received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Greeting listing the protocol versions the server supports.
    Hello {
        /// Versions in the order the server advertised them.
        supported_protocol_versions: Vec<ProtocolVersion>,
    },
    /// Successful reply to a request.
    Reply {
        /// Correlation token of the request, when present.
        cookie: Option<String>,
        /// The complete reply object.
        body: Value,
    },
    /// Failed reply to a request.
    Error {
        /// Correlation token of the request, when present.
        cookie: Option<String>,
        /// The server's error text.
        error_message: String,
        /// The complete reply object.
        body: Value,
    },
    /// Diagnostic text.
    Message {
        /// Optional heading.
        title: Option<String>,
        /// The message text.
        message: String,
    },
    /// Progress of a long-running request.
    Progress(ProgressData),
    /// A change to a watched file.
    FileChange {
        /// Path of the changed file.
        path: String,
        /// What changed.
        properties: Vec<String>,
    },
    /// Any other named signal.
    Signal {
        /// The signal name.
        name: String,
    },
    /// The connection to the server ended.
    Closed,
    /// A message type this client does not handle.
    Unknown {
        /// The unrecognised `type`.
        kind: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HelloFields {
    #[serde(default)]
    supported_protocol_versions: Vec<ProtocolVersion>,
}

#[derive(Deserialize)]
struct MessageFields {
    #[serde(default)]
    title: Option<String>,
    message: String,
}

#[derive(Deserialize)]
struct SignalFields {
    name: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    properties: Vec<String>,
}

impl ServerMessage {
    /// The synthetic value the transport delivers when the reader stops.
    #[must_use]
    pub fn closed_value() -> Value {
        serde_json::json!({ "type": "closed" })
    }

    /// Classifies a decoded JSON value by its `type` field.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingType`] when `type` is absent or not a
    /// string, and [`ProtocolError::InvalidMessage`] when a known message
    /// lacks its required fields.
    pub fn parse(value: Value) -> Result<Self, ProtocolError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_owned();

        match kind.as_str() {
            "hello" => {
                // A malformed version list counts as advertising nothing.
                let versions = decode_fields::<HelloFields>(&kind, &value)
                    .map(|fields| fields.supported_protocol_versions)
                    .unwrap_or_default();
                Ok(Self::Hello {
                    supported_protocol_versions: versions,
                })
            }
            "reply" => Ok(Self::Reply {
                cookie: cookie_of(&value),
                body: value,
            }),
            "error" => Ok(Self::Error {
                cookie: cookie_of(&value),
                error_message: value
                    .get("errorMessage")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                body: value,
            }),
            "message" => {
                let fields: MessageFields = decode_fields(&kind, &value)?;
                Ok(Self::Message {
                    title: fields.title,
                    message: fields.message,
                })
            }
            "progress" => Ok(Self::Progress(decode_fields(&kind, &value)?)),
            "signal" => {
                let fields: SignalFields = decode_fields(&kind, &value)?;
                if fields.name == FILE_CHANGE_SIGNAL {
                    Ok(Self::FileChange {
                        path: fields.path,
                        properties: fields.properties,
                    })
                } else {
                    Ok(Self::Signal { name: fields.name })
                }
            }
            "closed" => Ok(Self::Closed),
            _ => Ok(Self::Unknown { kind }),
        }
    }
}

fn decode_fields<T>(kind: &str, value: &Value) -> Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(value).map_err(|source| ProtocolError::InvalidMessage {
        kind: kind.to_owned(),
        source,
    })
}

fn cookie_of(value: &Value) -> Option<String> {
    value
        .get("cookie")
        .and_then(Value::as_str)
        .map(str::to_owned)
}
