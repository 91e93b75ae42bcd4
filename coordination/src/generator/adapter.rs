//! Section Generator Adapter.
//!
//! Drives one [`GenerationClient`] call for one section kind, normalising
//! bullets, suppressing empty progress, enforcing the per-section deadline,
//! and returning promptly once the cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::bullets::normalize_bullets;
use super::client::GenerationClient;
use super::errors::GenerationError;
use crate::sections::{SectionDelta, SectionKind};

/// One section generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRequest {
    pub kind: SectionKind,
    pub title: String,
    pub context: String,
}

impl SectionRequest {
    pub fn new(kind: SectionKind, title: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            context: context.into(),
        }
    }
}

#[derive(Clone)]
pub struct SectionGenerator {
    client: Arc<dyn GenerationClient>,
    timeout: Duration,
}

impl std::fmt::Debug for SectionGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionGenerator")
            .field("client", &self.client.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SectionGenerator {
    pub fn new(client: Arc<dyn GenerationClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn client(&self) -> &Arc<dyn GenerationClient> {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Generate one section, forwarding each non-empty delta to `on_delta`.
    ///
    /// Exactly one delta with `done == true` is forwarded on success, even
    /// when the client ends its stream without flagging one. The returned
    /// list is the final accumulated bullets.
    pub async fn generate<F>(
        &self,
        request: &SectionRequest,
        cancel: &CancellationToken,
        mut on_delta: F,
    ) -> Result<Vec<String>, GenerationError>
    where
        F: FnMut(SectionDelta) + Send,
    {
        let kind = request.kind;
        if request.context.trim().is_empty() {
            return Err(GenerationError::EmptyContext(kind));
        }
        if cancel.is_cancelled() {
            return Err(cancelled(kind));
        }

        let mut latest: Vec<String> = Vec::new();
        let mut finished = false;

        let outcome = {
            let latest = &mut latest;
            let finished = &mut finished;
            let forward = &mut on_delta;
            let mut callback = |raw: Vec<String>, done: bool| -> Result<(), GenerationError> {
                if cancel.is_cancelled() {
                    return Err(cancelled(kind));
                }
                if *finished {
                    return Ok(());
                }
                let bullets = normalize_bullets(&raw);
                if bullets.is_empty() && !done {
                    return Ok(());
                }
                if !bullets.is_empty() {
                    *latest = bullets;
                }
                if done {
                    *finished = true;
                }
                forward(SectionDelta::new(kind, latest.clone(), done));
                Ok(())
            };

            let stream = self.client.stream_section(
                cancel,
                kind,
                &request.title,
                &request.context,
                &mut callback,
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(cancelled(kind)),
                res = tokio::time::timeout(self.timeout, stream) => match res {
                    Ok(inner) => inner,
                    Err(_) => Err(GenerationError::Timeout(self.timeout)),
                },
            }
        };

        outcome?;
        if !finished {
            debug!(kind = %kind, "stream ended without a done flag; closing section");
            on_delta(SectionDelta::new(kind, latest.clone(), true));
        }
        Ok(latest)
    }

    /// Answer a question under the same deadline and cancellation rules.
    pub async fn answer(
        &self,
        cancel: &CancellationToken,
        title: &str,
        question: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled("question cancelled".into()));
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GenerationError::Cancelled("question cancelled".into())),
            res = tokio::time::timeout(self.timeout, self.client.answer(cancel, title, question, context)) => match res {
                Ok(inner) => inner.map(|text| text.trim().to_string()),
                Err(_) => Err(GenerationError::Timeout(self.timeout)),
            },
        }
    }
}

fn cancelled(kind: SectionKind) -> GenerationError {
    GenerationError::Cancelled(format!("{kind} section cancelled"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::client::DeltaCallback;
    use async_trait::async_trait;

    /// Replays a fixed script of raw deltas.
    struct Scripted {
        script: Vec<(Vec<&'static str>, bool)>,
        hang_after: bool,
    }

    #[async_trait]
    impl GenerationClient for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn stream_section(
            &self,
            cancel: &CancellationToken,
            _kind: SectionKind,
            _title: &str,
            _context: &str,
            on_delta: &mut DeltaCallback<'_>,
        ) -> Result<(), GenerationError> {
            for (bullets, done) in &self.script {
                on_delta(bullets.iter().map(|b| b.to_string()).collect(), *done)?;
                tokio::task::yield_now().await;
            }
            if self.hang_after {
                cancel.cancelled().await;
                return Err(GenerationError::Cancelled("client saw cancel".into()));
            }
            Ok(())
        }
    }

    fn generator(script: Vec<(Vec<&'static str>, bool)>, hang_after: bool) -> SectionGenerator {
        SectionGenerator::new(
            Arc::new(Scripted { script, hang_after }),
            Duration::from_secs(5),
        )
    }

    fn request() -> SectionRequest {
        SectionRequest::new(SectionKind::Summary, "Paper", "Some context.")
    }

    #[tokio::test]
    async fn empty_context_is_refused() {
        let gen = generator(vec![], false);
        let req = SectionRequest::new(SectionKind::Technical, "Paper", "   ");
        let err = gen
            .generate(&req, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::EmptyContext(SectionKind::Technical)));
    }

    #[tokio::test]
    async fn empty_progress_is_suppressed_and_final_list_returned() {
        let gen = generator(
            vec![
                (vec!["- "], false),
                (vec!["- first"], false),
                (vec![], false),
                (vec!["- first", "2. second"], true),
            ],
            false,
        );
        let mut deltas = Vec::new();
        let result = gen
            .generate(&request(), &CancellationToken::new(), |d| deltas.push(d))
            .await
            .unwrap();
        assert_eq!(result, vec!["first", "second"]);
        assert_eq!(deltas.len(), 2);
        assert!(!deltas[0].done);
        assert!(deltas[1].done);
        assert!(deltas.iter().all(|d| d.kind == SectionKind::Summary));
    }

    #[tokio::test]
    async fn done_with_no_bullets_keeps_accumulated_list() {
        let gen = generator(vec![(vec!["a point"], false), (vec![], true)], false);
        let mut deltas = Vec::new();
        let result = gen
            .generate(&request(), &CancellationToken::new(), |d| deltas.push(d))
            .await
            .unwrap();
        assert_eq!(result, vec!["a point"]);
        assert_eq!(deltas.last().unwrap().bullets, vec!["a point"]);
    }

    #[tokio::test]
    async fn clean_end_without_done_synthesizes_terminal_delta() {
        let gen = generator(vec![(vec!["only"], false)], false);
        let mut deltas = Vec::new();
        gen.generate(&request(), &CancellationToken::new(), |d| deltas.push(d))
            .await
            .unwrap();
        assert_eq!(deltas.len(), 2);
        assert!(deltas[1].done);
        assert_eq!(deltas[1].bullets, vec!["only"]);
    }

    #[tokio::test]
    async fn cancellation_returns_promptly() {
        let gen = generator(vec![(vec!["partial"], false)], true);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut count = 0;
            let res = gen.generate(&request(), &cancel, |_| count += 1).await;
            (res, count)
        });
        tokio::task::yield_now().await;
        trigger.cancel();
        let (res, count) = handle.await.unwrap();
        assert!(res.unwrap_err().is_cancelled());
        assert!(count <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_a_timeout() {
        let gen = SectionGenerator::new(
            Arc::new(Scripted {
                script: vec![],
                hang_after: true,
            }),
            Duration::from_secs(120),
        );
        let err = gen
            .generate(&request(), &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }

    #[tokio::test]
    async fn unsupported_answer_surfaces() {
        let gen = generator(vec![], false);
        let err = gen
            .answer(&CancellationToken::new(), "Paper", "Why?", "ctx")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unsupported(_)));
    }
}
