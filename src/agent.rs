//! Typed surface for the Copilot agent's method set.
//!
//! Thin wrappers over [`ClientHandle`]: each method serializes its params,
//! goes through the ordinary request/notification path, and deserializes the
//! result. Method names are protocol constants of the wrapped service and
//! must round-trip losslessly through the codec.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::ClientHandle;
use crate::error::Result;

/// Method names understood by the agent.
pub mod method {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "initialized";
    pub const CHECK_STATUS: &str = "checkStatus";
    pub const SIGN_IN_INITIATE: &str = "signInInitiate";
    pub const SIGN_IN_CONFIRM: &str = "signInConfirm";
    pub const SIGN_OUT: &str = "signOut";
    pub const DID_OPEN: &str = "textDocument/didOpen";
    pub const DID_CHANGE: &str = "textDocument/didChange";
    pub const DID_CLOSE: &str = "textDocument/didClose";
    pub const INLINE_COMPLETION: &str = "textDocument/inlineCompletion";
}

/// Zero-based position within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// Half-open range between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Full document payload for `didOpen`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentItem {
    pub uri: String,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

/// One full-text replacement for `didChange`.
#[derive(Debug, Clone, Serialize)]
pub struct ContentChange {
    pub text: String,
}

/// Authentication state reported by `checkStatus`.
///
/// `user` is present only when signed in.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl AuthStatus {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Device-flow handle returned by `signInInitiate`: the user opens
/// `verification_uri` in a browser and enters `user_code` there.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInInitiate {
    pub verification_uri: String,
    pub user_code: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub interval: Option<u64>,
}

/// Outcome of `signInConfirm`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInConfirm {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

impl SignInConfirm {
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// One inline completion candidate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineCompletionItem {
    pub insert_text: String,
    pub range: Range,
    #[serde(default)]
    pub command: Option<Value>,
}

/// Result of `textDocument/inlineCompletion`.
#[derive(Debug, Clone, Deserialize)]
pub struct InlineCompletions {
    #[serde(default)]
    pub items: Vec<InlineCompletionItem>,
}

/// Typed client for the Copilot agent.
///
/// Cheaply cloneable; every method is safe to call concurrently.
#[derive(Clone)]
pub struct Agent {
    client: ClientHandle,
}

impl Agent {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }

    /// `initialize` handshake. Returns the server's capability object.
    pub async fn initialize(&self) -> Result<Value> {
        self.client
            .send_request(
                method::INITIALIZE,
                json!({"capabilities": {"workspace": {"workspaceFolders": true}}}),
            )
            .await
    }

    /// `initialized` notification, sent once after the handshake response.
    pub async fn initialized(&self) -> Result<()> {
        self.client
            .send_notification(method::INITIALIZED, json!({}))
            .await
    }

    /// Query the current authentication state.
    pub async fn check_status(&self) -> Result<AuthStatus> {
        let result = self.client.send_request(method::CHECK_STATUS, json!({})).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Begin the device-code sign-in flow.
    pub async fn sign_in_initiate(&self) -> Result<SignInInitiate> {
        let result = self
            .client
            .send_request(method::SIGN_IN_INITIATE, json!({}))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Confirm the device-code flow once the user has authenticated in the
    /// browser.
    pub async fn sign_in_confirm(&self, user_code: &str) -> Result<SignInConfirm> {
        let result = self
            .client
            .send_request(method::SIGN_IN_CONFIRM, json!({"userCode": user_code}))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Discard the stored credentials.
    pub async fn sign_out(&self) -> Result<()> {
        self.client.send_request(method::SIGN_OUT, json!({})).await?;
        Ok(())
    }

    /// Announce an opened document.
    pub async fn did_open(&self, document: &TextDocumentItem) -> Result<()> {
        self.client
            .send_notification(method::DID_OPEN, json!({"textDocument": document}))
            .await
    }

    /// Announce a document edit as a full-text replacement.
    pub async fn did_change(
        &self,
        uri: &str,
        version: i32,
        changes: &[ContentChange],
    ) -> Result<()> {
        self.client
            .send_notification(
                method::DID_CHANGE,
                json!({
                    "textDocument": {"uri": uri, "version": version},
                    "contentChanges": changes,
                }),
            )
            .await
    }

    /// Announce a closed document.
    pub async fn did_close(&self, uri: &str) -> Result<()> {
        self.client
            .send_notification(method::DID_CLOSE, json!({"textDocument": {"uri": uri}}))
            .await
    }

    /// Request inline completions at a cursor position.
    pub async fn inline_completion(
        &self,
        uri: &str,
        version: i32,
        position: Position,
    ) -> Result<InlineCompletions> {
        let result = self
            .client
            .send_request(
                method::INLINE_COMPLETION,
                json!({
                    "version": version,
                    "position": position,
                    "textDocument": {"uri": uri},
                    "context": {"triggerKind": 1},
                }),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_status_signed_out() {
        let status: AuthStatus = serde_json::from_value(json!({"status": "NotSignedIn"})).unwrap();
        assert!(!status.is_signed_in());
        assert_eq!(status.status.as_deref(), Some("NotSignedIn"));
    }

    #[test]
    fn test_auth_status_signed_in() {
        let status: AuthStatus =
            serde_json::from_value(json!({"status": "OK", "user": "octocat"})).unwrap();
        assert!(status.is_signed_in());
        assert_eq!(status.user.as_deref(), Some("octocat"));
    }

    #[test]
    fn test_sign_in_initiate_camel_case() {
        let initiate: SignInInitiate = serde_json::from_value(json!({
            "verificationUri": "https://github.com/login/device",
            "userCode": "ABCD-1234",
            "expiresIn": 899,
            "interval": 5
        }))
        .unwrap();

        assert_eq!(initiate.verification_uri, "https://github.com/login/device");
        assert_eq!(initiate.user_code, "ABCD-1234");
        assert_eq!(initiate.expires_in, Some(899));
    }

    #[test]
    fn test_sign_in_confirm_error() {
        let confirm: SignInConfirm =
            serde_json::from_value(json!({"status": "error", "error": "code expired"})).unwrap();
        assert!(confirm.is_error());
        assert_eq!(confirm.error.as_deref(), Some("code expired"));
    }

    #[test]
    fn test_inline_completions_deserialization() {
        let completions: InlineCompletions = serde_json::from_value(json!({
            "items": [{
                "insertText": "let x = 1;\nlet y = 2;",
                "range": {
                    "start": {"line": 3, "character": 0},
                    "end": {"line": 3, "character": 0}
                }
            }]
        }))
        .unwrap();

        assert_eq!(completions.items.len(), 1);
        assert_eq!(completions.items[0].range.start.line, 3);
        assert!(completions.items[0].insert_text.contains('\n'));
    }

    #[test]
    fn test_inline_completions_empty_result() {
        let completions: InlineCompletions = serde_json::from_value(json!({})).unwrap();
        assert!(completions.items.is_empty());
    }

    #[test]
    fn test_text_document_item_wire_shape() {
        let item = TextDocumentItem {
            uri: "file:///main.rs".into(),
            language_id: "rust".into(),
            version: 1,
            text: "fn main() {}".into(),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["languageId"], "rust");
        assert!(value.get("language_id").is_none());
    }
}
