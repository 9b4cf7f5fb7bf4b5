//! Answering the mismatch gate.
//!
//! The coordinator suspends on [`MismatchConfirmer::confirm`] until the
//! user answers. `true` lets the upload start; `false` leaves the entry
//! exactly as it was.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use sellerdesk_core::mismatch_gate::MismatchPrompt;

#[async_trait]
pub trait MismatchConfirmer: Send + Sync {
    async fn confirm(&self, prompt: &MismatchPrompt) -> bool;
}

/// Confirms every prompt. Used for unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

#[async_trait]
impl MismatchConfirmer for AlwaysConfirm {
    async fn confirm(&self, prompt: &MismatchPrompt) -> bool {
        tracing::info!(
            entry_id = %prompt.entry_id,
            file = %prompt.file_name,
            "Auto-confirming account mismatch",
        );
        true
    }
}

/// Cancels every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverConfirm;

#[async_trait]
impl MismatchConfirmer for NeverConfirm {
    async fn confirm(&self, _prompt: &MismatchPrompt) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Channel confirmer
// ---------------------------------------------------------------------------

/// A prompt waiting for an answer from whoever holds the receiving end.
///
/// Dropping it without answering counts as cancel.
#[derive(Debug)]
pub struct ConfirmationRequest {
    pub prompt: MismatchPrompt,
    responder: oneshot::Sender<bool>,
}

impl ConfirmationRequest {
    pub fn confirm(self) {
        let _ = self.responder.send(true);
    }

    pub fn cancel(self) {
        let _ = self.responder.send(false);
    }
}

/// Forwards prompts to a UI task over a channel and waits for its answer.
#[derive(Debug, Clone)]
pub struct ChannelConfirmer {
    tx: mpsc::Sender<ConfirmationRequest>,
}

impl ChannelConfirmer {
    /// Create a confirmer and the receiver the UI side listens on.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ConfirmationRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MismatchConfirmer for ChannelConfirmer {
    async fn confirm(&self, prompt: &MismatchPrompt) -> bool {
        let (responder, answer) = oneshot::channel();
        let request = ConfirmationRequest {
            prompt: prompt.clone(),
            responder,
        };
        if self.tx.send(request).await.is_err() {
            tracing::warn!(entry_id = %prompt.entry_id, "No confirmation listener, cancelling");
            return false;
        }
        answer.await.unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Terminal confirmer
// ---------------------------------------------------------------------------

/// Asks on stderr and reads `y`/`yes` from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmer;

#[async_trait]
impl MismatchConfirmer for StdinConfirmer {
    async fn confirm(&self, prompt: &MismatchPrompt) -> bool {
        let question = format!("{}\nUpload anyway? [y/N] ", prompt.describe());
        let answer = tokio::task::spawn_blocking(move || {
            use std::io::Write;

            eprint!("{question}");
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_affirmative(&line),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to read confirmation, cancelling");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Confirmation task failed, cancelling");
                false
            }
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> MismatchPrompt {
        MismatchPrompt {
            entry_id: uuid::Uuid::new_v4(),
            file_name: "b.csv".into(),
            detected_username: "bob".into(),
            account_id: 2,
            account_name: "Carol".into(),
            account_platform_username: Some("carol".into()),
        }
    }

    #[tokio::test]
    async fn channel_confirmer_relays_answers() {
        let (confirmer, mut rx) = ChannelConfirmer::new(1);
        let ui = tokio::spawn(async move {
            let first = rx.recv().await.unwrap();
            assert_eq!(first.prompt.detected_username, "bob");
            first.confirm();
            rx.recv().await.unwrap().cancel();
        });

        assert!(confirmer.confirm(&prompt()).await);
        assert!(!confirmer.confirm(&prompt()).await);
        ui.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_request_counts_as_cancel() {
        let (confirmer, mut rx) = ChannelConfirmer::new(1);
        let ui = tokio::spawn(async move {
            drop(rx.recv().await);
        });
        assert!(!confirmer.confirm(&prompt()).await);
        ui.await.unwrap();
    }

    #[tokio::test]
    async fn closed_channel_counts_as_cancel() {
        let (confirmer, rx) = ChannelConfirmer::new(1);
        drop(rx);
        assert!(!confirmer.confirm(&prompt()).await);
    }

    #[tokio::test]
    async fn fixed_confirmers() {
        assert!(AlwaysConfirm.confirm(&prompt()).await);
        assert!(!NeverConfirm.confirm(&prompt()).await);
    }

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
    }
}
