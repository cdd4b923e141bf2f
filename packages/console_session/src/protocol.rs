//! Session Protocol Codec
//!
//! One JSON object per WebSocket text frame, discriminated by a `type` tag.
//!
//! Server → client: `output`, `prompt`, `clear`.
//! Client → server: `init`, `input`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::DecodeError;

/// Style class applied to output lines that do not name one.
pub const DEFAULT_CLASS_NAME: &str = "line";

/// Language reported when the environment does not name a usable locale.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Type tags this client understands. Anything else is dropped unread.
const KNOWN_SERVER_TYPES: &[&str] = &["output", "prompt", "clear"];

/// Messages sent FROM the server TO the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Append one line of markup to the render surface.
    Output {
        content: String,
        #[serde(rename = "className", default = "default_class_name")]
        class_name: String,
    },
    /// Ask the operator for exactly one value.
    Prompt {
        content: String,
        #[serde(rename = "isPassword", default)]
        is_password: bool,
    },
    /// Remove everything from the render surface.
    Clear,
}

fn default_class_name() -> String {
    DEFAULT_CLASS_NAME.to_string()
}

/// Messages sent FROM the client TO the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// First frame on every connection.
    Init(ClientMetadata),
    /// The operator's answer to the outstanding prompt, verbatim.
    Input { content: String },
}

/// What the client tells the server about itself on connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetadata {
    pub user_agent: String,
    pub language: String,
}

impl ClientMetadata {
    pub fn new(user_agent: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            language: language.into(),
        }
    }

    /// Build metadata from the running platform and the locale environment.
    ///
    /// The user agent carries the same platform tokens a browser would
    /// (`Windows NT`, `Macintosh`, `Linux`, `Android`) because servers sniff
    /// the operating system out of it.
    pub fn detect(product: &str, version: &str) -> Self {
        Self {
            user_agent: user_agent(product, version, std::env::consts::OS),
            language: language_from_env(),
        }
    }
}

/// `product/version (platform)`.
pub fn user_agent(product: &str, version: &str, os: &str) -> String {
    format!("{}/{} ({})", product, version, platform_token(os))
}

fn platform_token(os: &str) -> &str {
    match os {
        "windows" => "Windows NT",
        "macos" => "Macintosh",
        "linux" => "Linux",
        "android" => "Android",
        other => other,
    }
}

/// Turn a POSIX locale (`zh_CN.UTF-8`, `de_DE@euro`) into a BCP-47 tag.
/// Returns `None` for the portable `C`/`POSIX` locales.
pub fn language_tag(locale: &str) -> Option<String> {
    let base = locale.split(['.', '@']).next()?.trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}

fn language_from_env() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find_map(|value| language_tag(&value))
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

/// Decode one server frame.
///
/// `Ok(None)` means the frame was well formed but carried a type tag this
/// client does not know; such frames are ignored for forward compatibility.
pub fn decode(raw: &str) -> Result<Option<ServerMessage>, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Value::Object(ref fields) = value else {
        return Err(DecodeError::Malformed("frame is not an object".to_string()));
    };

    let kind = match fields.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        _ => return Err(DecodeError::MissingType),
    };

    if !KNOWN_SERVER_TYPES.contains(&kind.as_str()) {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| DecodeError::InvalidFields {
            kind,
            reason: e.to_string(),
        })
}

/// Encode one client frame. Total: every `ClientMessage` has a wire form.
pub fn encode(msg: &ClientMessage) -> String {
    let value = match msg {
        ClientMessage::Init(meta) => json!({
            "type": "init",
            "userAgent": meta.user_agent,
            "language": meta.language,
        }),
        ClientMessage::Input { content } => json!({
            "type": "input",
            "content": content,
        }),
    };
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_output_with_class() {
        let msg = decode(r#"{"type":"output","content":"<b>hi</b>","className":"ascii-art"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Output {
                content: "<b>hi</b>".to_string(),
                class_name: "ascii-art".to_string(),
            }
        );
    }

    #[test]
    fn decode_output_defaults_class_to_line() {
        let msg = decode(r#"{"type":"output","content":"x"}"#).unwrap().unwrap();
        match msg {
            ServerMessage::Output { class_name, .. } => assert_eq!(class_name, "line"),
            other => panic!("expected output, got {:?}", other),
        }
    }

    #[test]
    fn decode_prompt_defaults_to_plain() {
        let msg = decode(r#"{"type":"prompt","content":"login as: "}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Prompt {
                content: "login as: ".to_string(),
                is_password: false,
            }
        );
    }

    #[test]
    fn decode_password_prompt() {
        let msg = decode(r#"{"type":"prompt","content":"password: ","isPassword":true}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(
            msg,
            ServerMessage::Prompt {
                is_password: true,
                ..
            }
        ));
    }

    #[test]
    fn decode_clear_ignores_extra_fields() {
        let msg = decode(r#"{"type":"clear","reason":"user"}"#).unwrap().unwrap();
        assert_eq!(msg, ServerMessage::Clear);
    }

    #[test]
    fn unknown_type_is_dropped_not_an_error() {
        assert_eq!(decode(r#"{"type":"message","text":"hi"}"#).unwrap(), None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            decode("{not json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(decode("[1,2]"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn missing_or_non_string_type_is_an_error() {
        assert_eq!(decode(r#"{"content":"x"}"#), Err(DecodeError::MissingType));
        assert_eq!(decode(r#"{"type":7}"#), Err(DecodeError::MissingType));
    }

    #[test]
    fn known_type_with_bad_fields_is_an_error() {
        let err = decode(r#"{"type":"output"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidFields { ref kind, .. } if kind == "output"));
        assert!(decode(r#"{"type":"prompt","content":"x","isPassword":"yes"}"#).is_err());
    }

    #[test]
    fn encode_init_uses_wire_field_names() {
        let raw = encode(&ClientMessage::Init(ClientMetadata::new(
            "console/0.1.0 (Linux)",
            "zh-CN",
        )));
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["userAgent"], "console/0.1.0 (Linux)");
        assert_eq!(value["language"], "zh-CN");
    }

    #[test]
    fn encode_input_is_verbatim() {
        let raw = encode(&ClientMessage::Input {
            content: "  \"quoted\" }{ \n".to_string(),
        });
        let back: ClientMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            back,
            ClientMessage::Input {
                content: "  \"quoted\" }{ \n".to_string()
            }
        );
    }

    #[test]
    fn user_agent_carries_platform_token() {
        assert_eq!(user_agent("console", "1.2.3", "windows"), "console/1.2.3 (Windows NT)");
        assert_eq!(user_agent("console", "1.2.3", "macos"), "console/1.2.3 (Macintosh)");
        assert_eq!(user_agent("console", "1.2.3", "freebsd"), "console/1.2.3 (freebsd)");
    }

    #[test]
    fn locale_to_language_tag() {
        assert_eq!(language_tag("zh_CN.UTF-8").as_deref(), Some("zh-CN"));
        assert_eq!(language_tag("de_DE@euro").as_deref(), Some("de-DE"));
        assert_eq!(language_tag("en").as_deref(), Some("en"));
        assert_eq!(language_tag("C.UTF-8"), None);
        assert_eq!(language_tag("POSIX"), None);
        assert_eq!(language_tag(""), None);
    }
}
