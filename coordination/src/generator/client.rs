//! Generation client seam.
//!
//! `GenerationClient` is the streaming capability the adapter drives.
//! Clients without incremental output implement `SectionCompletion` instead
//! and are wrapped in [`OneShot`], which reports the whole result as a single
//! terminal delta.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::errors::GenerationError;
use crate::sections::SectionKind;

/// Per-delta callback handed to a streaming client: `(accumulated bullets, done)`.
///
/// Returning an error tells the client to stop streaming; it should return
/// that error unchanged.
pub type DeltaCallback<'a> =
    dyn FnMut(Vec<String>, bool) -> Result<(), GenerationError> + Send + 'a;

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Short identifier used in logs and persisted LLM metadata.
    fn name(&self) -> &str;

    /// Model identifier, when the client has one.
    fn model(&self) -> Option<&str> {
        None
    }

    /// Stream one section. `on_delta` receives the full accumulated list on
    /// every call; `Ok(())` means the stream ended cleanly.
    async fn stream_section(
        &self,
        cancel: &CancellationToken,
        kind: SectionKind,
        title: &str,
        context: &str,
        on_delta: &mut DeltaCallback<'_>,
    ) -> Result<(), GenerationError>;

    /// Answer a follow-up question about the document.
    async fn answer(
        &self,
        cancel: &CancellationToken,
        title: &str,
        question: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let _ = (cancel, title, question, context);
        Err(GenerationError::Unsupported(format!(
            "{} cannot answer questions",
            self.name()
        )))
    }
}

/// Whole-result generation for clients with no incremental output.
#[async_trait]
pub trait SectionCompletion: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> Option<&str> {
        None
    }

    async fn generate_section(
        &self,
        cancel: &CancellationToken,
        kind: SectionKind,
        title: &str,
        context: &str,
    ) -> Result<Vec<String>, GenerationError>;

    async fn answer(
        &self,
        cancel: &CancellationToken,
        title: &str,
        question: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let _ = (cancel, title, question, context);
        Err(GenerationError::Unsupported(format!(
            "{} cannot answer questions",
            self.name()
        )))
    }
}

/// Adapts a [`SectionCompletion`] into a [`GenerationClient`].
#[derive(Debug, Clone)]
pub struct OneShot<C>(pub C);

impl<C> OneShot<C> {
    pub fn new(inner: C) -> Self {
        Self(inner)
    }

    pub fn into_inner(self) -> C {
        self.0
    }
}

#[async_trait]
impl<C: SectionCompletion> GenerationClient for OneShot<C> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn model(&self) -> Option<&str> {
        self.0.model()
    }

    async fn stream_section(
        &self,
        cancel: &CancellationToken,
        kind: SectionKind,
        title: &str,
        context: &str,
        on_delta: &mut DeltaCallback<'_>,
    ) -> Result<(), GenerationError> {
        let bullets = self.0.generate_section(cancel, kind, title, context).await?;
        on_delta(bullets, true)
    }

    async fn answer(
        &self,
        cancel: &CancellationToken,
        title: &str,
        question: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        self.0.answer(cancel, title, question, context).await
    }
}
