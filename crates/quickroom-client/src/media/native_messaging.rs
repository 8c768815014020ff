//! Reach the screen-capture extension through a native-messaging host
//!
//! Each request spawns the host, writes one framed message and reads one
//! framed reply. Framing is a u32 length in native byte order followed by
//! UTF-8 JSON, the same as browser native messaging.

use async_trait::async_trait;
use quickroom_protocol::ExtensionRequest;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

use super::screen::{ExtensionMessenger, ScreenShareError};

/// Upper bound on a single framed message
const MAX_MESSAGE_LEN: u32 = 1024 * 1024;

pub struct NativeMessagingHost {
    command: PathBuf,
    /// How long the user may take in the extension's picker
    timeout: Duration,
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "extensionId")]
    extension_id: &'a str,
    message: &'a ExtensionRequest,
}

impl NativeMessagingHost {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange(&self, payload: &[u8]) -> Result<serde_json::Value, ScreenShareError> {
        let mut child = Command::new(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScreenShareError::Messaging(format!("failed to start {:?}: {}", self.command, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ScreenShareError::Messaging("host stdin unavailable".to_string()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScreenShareError::Messaging("host stdout unavailable".to_string()))?;

        write_frame(&mut stdin, payload).await?;
        drop(stdin);

        let reply = read_frame(&mut stdout).await?;
        if let Err(e) = child.wait().await {
            tracing::warn!("Native messaging host did not exit cleanly: {}", e);
        }

        serde_json::from_slice(&reply).map_err(|_| ScreenShareError::UnknownResponse)
    }
}

#[async_trait]
impl ExtensionMessenger for NativeMessagingHost {
    async fn is_installed(&self, _extension_id: &str) -> bool {
        tokio::fs::metadata(&self.command)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn send_message(
        &self,
        extension_id: &str,
        request: &ExtensionRequest,
    ) -> Result<serde_json::Value, ScreenShareError> {
        let payload = serde_json::to_vec(&Envelope {
            extension_id,
            message: request,
        })
        .map_err(|e| ScreenShareError::Messaging(e.to_string()))?;

        tokio::time::timeout(self.timeout, self.exchange(&payload))
            .await
            .map_err(|_| ScreenShareError::Messaging("timed out waiting for extension".to_string()))?
    }
}

pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), ScreenShareError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_MESSAGE_LEN)
        .ok_or_else(|| ScreenShareError::Messaging("message too large".to_string()))?;

    let write = async {
        writer.write_all(&len.to_ne_bytes()).await?;
        writer.write_all(payload).await?;
        writer.flush().await
    };
    write
        .await
        .map_err(|e| ScreenShareError::Messaging(e.to_string()))
}

pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ScreenShareError> {
    let mut len = [0u8; 4];
    reader
        .read_exact(&mut len)
        .await
        .map_err(|e| ScreenShareError::Messaging(format!("no reply from host: {}", e)))?;

    let len = u32::from_ne_bytes(len);
    if len > MAX_MESSAGE_LEN {
        return Err(ScreenShareError::Messaging(format!("reply of {} bytes is too large", len)));
    }

    let mut buf = vec![0u8; len as usize];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| ScreenShareError::Messaging(format!("truncated reply: {}", e)))?;
    Ok(buf)
}
