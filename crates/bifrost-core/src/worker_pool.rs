use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bifrost_pool::Pooled;
use bifrost_provider_core::{Credential, ProviderCapability, ProviderConfig, RequestKind, Response};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::envelope::{Attempt, Envelope};
use crate::error::Error;

/// One envelope plus the credential the dispatcher already selected for it;
/// the worker never calls the selector itself.
///
/// `cancel` is the per-attempt child of the inbound request's cancellation
/// token (see `Dispatcher::dispatch_once`): the worker races the provider
/// call against it so an inbound cancel or provider-timeout releases the
/// worker instead of leaving it blocked on a hung upstream.
pub struct WorkItem {
    pub envelope: Pooled<Envelope>,
    pub credential: Credential,
    pub cancel: CancellationToken,
}

/// Bounded FIFO queue + fixed worker cardinality for one provider.
pub struct WorkerPool {
    provider: String,
    tx: StdMutex<Option<mpsc::Sender<WorkItem>>>,
    cancel: CancellationToken,
    drop_excess: bool,
    request_timeout: Duration,
    workers: TokioMutex<Option<JoinSet<()>>>,
    in_flight: Arc<AtomicU32>,
}

impl WorkerPool {
    pub fn spawn(
        provider: impl Into<String>,
        config: ProviderConfig,
        capability: Arc<dyn ProviderCapability>,
    ) -> Arc<Self> {
        let provider = provider.into();
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let rx = Arc::new(TokioMutex::new(rx));
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicU32::new(0));

        let mut workers = JoinSet::new();
        for worker_index in 0..config.worker_concurrency.max(1) {
            let rx = Arc::clone(&rx);
            let capability = Arc::clone(&capability);
            let config = config.clone();
            let provider_name = provider.clone();
            let cancel = cancel.clone();
            let in_flight = Arc::clone(&in_flight);
            workers.spawn(async move {
                worker_loop(worker_index, provider_name, rx, capability, config, cancel, in_flight).await;
            });
        }

        Arc::new(Self {
            provider,
            tx: StdMutex::new(Some(tx)),
            cancel,
            drop_excess: config.drop_excess,
            request_timeout: config.request_timeout,
            workers: TokioMutex::new(Some(workers)),
            in_flight,
        })
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Per-provider request timeout, layered
    /// beneath the inbound context by the dispatcher.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Enqueues `item`. With drop-excess on this never suspends, returning
    /// `QueueFull` immediately on a full queue. With drop-excess off it
    /// suspends until capacity appears or `cancel_token` fires.
    pub async fn enqueue(&self, item: WorkItem, cancel_token: CancellationToken) -> Result<(), Error> {
        let tx = {
            let guard = self.tx.lock().expect("worker pool sender mutex poisoned");
            guard.clone()
        };
        let Some(tx) = tx else {
            return Err(Error::internal(format!("worker pool for {} is shut down", self.provider)));
        };

        if self.drop_excess {
            return tx.try_send(item).map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => Error::queue_full(self.provider.clone()),
                mpsc::error::TrySendError::Closed(_) => {
                    Error::internal(format!("worker pool for {} is shut down", self.provider))
                }
            });
        }

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => Err(Error::canceled()),
            result = tx.send(item) => result.map_err(|_| {
                Error::internal(format!("worker pool for {} is shut down", self.provider))
            }),
        }
    }

    /// Stops accepting new work. With `drain = true`, already-queued
    /// envelopes are processed to completion; with `drain = false` queued
    /// envelopes are abandoned (their reply channel drops, surfacing
    /// `Canceled` to the waiting dispatcher) as soon as the current item
    /// finishes.
    pub async fn shutdown(&self, drain: bool) {
        {
            let mut guard = self.tx.lock().expect("worker pool sender mutex poisoned");
            *guard = None;
        }
        if !drain {
            self.cancel.cancel();
        }
        if let Some(mut workers) = self.workers.lock().await.take() {
            while workers.join_next().await.is_some() {}
        }
        debug!(provider = %self.provider, "worker pool shut down");
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_index: usize,
    provider: String,
    rx: Arc<TokioMutex<mpsc::Receiver<WorkItem>>>,
    capability: Arc<dyn ProviderCapability>,
    config: ProviderConfig,
    cancel: CancellationToken,
    in_flight: Arc<AtomicU32>,
) {
    loop {
        let item = {
            let mut guard = rx.lock().await;
            tokio::select! {
                item = guard.recv() => item,
                _ = cancel.cancelled() => None,
            }
        };
        let Some(WorkItem { mut envelope, credential, cancel: attempt_cancel }) = item else {
            break;
        };

        in_flight.fetch_add(1, Ordering::Relaxed);
        let (response, error) =
            invoke_with_retry(&provider, &capability, &config, &credential, &envelope.spec, &attempt_cancel).await;
        in_flight.fetch_sub(1, Ordering::Relaxed);

        if let Some(tx) = envelope.reply_tx.take() {
            let _ = tx.send((response, error));
        } else {
            warn!(provider = %provider, worker = worker_index, "envelope arrived at worker with no reply sender");
        }
    }
}

/// Retries a provider call within one attempt, racing every network call
/// (including the inter-retry backoff sleep) against `cancel` — the
/// per-attempt child of the inbound request's cancellation token — so a
/// canceled or timed-out attempt releases the worker instead of leaving it
/// blocked on a hung upstream (§5: "cancellation propagates to ... the
/// worker's upstream call").
async fn invoke_with_retry(
    provider: &str,
    capability: &Arc<dyn ProviderCapability>,
    config: &ProviderConfig,
    credential: &Credential,
    spec: &bifrost_provider_core::RequestSpec,
    cancel: &CancellationToken,
) -> Attempt {
    let mut attempt = 0u32;
    let mut backoff = config.retry_backoff_initial;

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (None, Some(Error::canceled())),
            outcome = invoke_once(capability, config, credential, spec) => outcome,
        };

        match outcome {
            Ok(response) => return (Some(response), None),
            Err(provider_err) => {
                if provider_err.retryable && attempt < config.max_retries {
                    attempt += 1;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return (None, Some(Error::canceled())),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = backoff.saturating_mul(2).min(config.retry_backoff_max);
                    continue;
                }
                return (None, Some(Error::from_provider_error(provider, provider_err)));
            }
        }
    }
}

async fn invoke_once(
    capability: &Arc<dyn ProviderCapability>,
    config: &ProviderConfig,
    credential: &Credential,
    spec: &bifrost_provider_core::RequestSpec,
) -> bifrost_provider_core::ProviderResult<Response> {
    match spec.kind {
        RequestKind::Chat => {
            let messages = spec.input.messages.as_deref().unwrap_or(&[]);
            capability
                .chat_completion(&spec.model, credential, messages, &spec.params, config)
                .await
        }
        RequestKind::Text => {
            let text = spec.input.text.as_deref().unwrap_or("");
            capability
                .text_completion(&spec.model, credential, text, &spec.params, config)
                .await
        }
        RequestKind::Embedding => {
            let input = spec
                .input
                .embedding
                .as_ref()
                .expect("RequestSpec::validate guarantees embedding input for Embedding kind");
            capability
                .embedding(&spec.model, credential, input, &spec.params, config)
                .await
        }
        RequestKind::Speech => {
            let audio = spec
                .input
                .audio
                .as_ref()
                .expect("RequestSpec::validate guarantees audio input for Speech kind");
            capability.speech(&spec.model, credential, audio, &spec.params, config).await
        }
        RequestKind::Transcription => {
            let audio = spec
                .input
                .audio
                .as_ref()
                .expect("RequestSpec::validate guarantees audio input for Transcription kind");
            capability
                .transcription(&spec.model, credential, audio, &spec.params, config)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bifrost_pool::Pool;
    use bifrost_provider_core::{
        AudioInput, Choice, EmbeddingInput, ExtraFields, FinishReason, Message, Params, ProviderError,
        ProviderErrorKind, ProviderResult, RequestInput, RequestSpec, Usage,
    };
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    use super::*;

    struct FlakyOnceProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderCapability for FlakyOnceProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn chat_completion(
            &self,
            _model: &str,
            _credential: &Credential,
            _messages: &[Message],
            _params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                return Err(ProviderError::new(503, ProviderErrorKind::Overloaded, "try again", true));
            }
            Ok(Response::single_choice(
                "id",
                "chat.completion",
                "gpt-4o",
                0,
                Message::assistant("ok"),
                FinishReason::Stop,
                Usage::default(),
                ExtraFields {
                    provider: "flaky".into(),
                    model_params: Params::default(),
                    latency: StdDuration::ZERO,
                    raw_response: None,
                    chat_history: None,
                },
            ))
        }

        async fn text_completion(
            &self,
            _model: &str,
            _credential: &Credential,
            _prompt: &str,
            _params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            unreachable!("not exercised")
        }

        async fn embedding(
            &self,
            _model: &str,
            _credential: &Credential,
            _input: &EmbeddingInput,
            _params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            unreachable!("not exercised")
        }

        async fn speech(
            &self,
            _model: &str,
            _credential: &Credential,
            _audio: &AudioInput,
            _params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            unreachable!("not exercised")
        }

        async fn transcription(
            &self,
            _model: &str,
            _credential: &Credential,
            _audio: &AudioInput,
            _params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            unreachable!("not exercised")
        }
    }

    fn chat_envelope(pool: &Arc<Pool<Envelope>>) -> (Pooled<Envelope>, tokio::sync::oneshot::Receiver<Attempt>) {
        let mut envelope = pool.get();
        let (tx, rx) = tokio::sync::oneshot::channel();
        envelope.populate(
            RequestSpec {
                provider: "flaky".into(),
                model: "gpt-4o".into(),
                kind: RequestKind::Chat,
                input: RequestInput {
                    messages: Some(vec![Message::user("hi")]),
                    ..Default::default()
                },
                params: Params::default(),
                fallbacks: vec![],
            },
            tx,
        );
        (envelope, rx)
    }

    #[tokio::test]
    async fn retries_transient_failure_within_one_attempt() {
        let mut config = ProviderConfig::default();
        config.max_retries = 1;
        config.retry_backoff_initial = StdDuration::from_millis(1);
        config.retry_backoff_max = StdDuration::from_millis(2);
        config.worker_concurrency = 1;
        config.queue_depth = 4;

        let capability = Arc::new(FlakyOnceProvider { calls: AtomicUsize::new(0) });
        let pool = WorkerPool::spawn("flaky", config, capability);
        let envelope_pool = Pool::new(1, 1, Envelope::default);

        let (envelope, rx) = chat_envelope(&envelope_pool);
        let credential = Credential::new("sk-test", 1.0);
        pool.enqueue(WorkItem { envelope, credential, cancel: CancellationToken::new() }, CancellationToken::new())
            .await
            .unwrap();

        let (response, error) = rx.await.unwrap();
        assert!(error.is_none());
        assert!(response.is_some());
        pool.shutdown(true).await;
    }

    struct BlockingProvider;

    #[async_trait]
    impl ProviderCapability for BlockingProvider {
        fn name(&self) -> &str {
            "blocking"
        }

        async fn chat_completion(
            &self,
            _model: &str,
            _credential: &Credential,
            _messages: &[Message],
            _params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            tokio::time::sleep(StdDuration::from_millis(200)).await;
            Ok(Response::single_choice(
                "id",
                "chat.completion",
                "gpt-4o",
                0,
                Message::assistant("ok"),
                FinishReason::Stop,
                Usage::default(),
                ExtraFields {
                    provider: "blocking".into(),
                    model_params: Params::default(),
                    latency: StdDuration::ZERO,
                    raw_response: None,
                    chat_history: None,
                },
            ))
        }

        async fn text_completion(
            &self,
            _model: &str,
            _credential: &Credential,
            _prompt: &str,
            _params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            unreachable!("not exercised")
        }

        async fn embedding(
            &self,
            _model: &str,
            _credential: &Credential,
            _input: &EmbeddingInput,
            _params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            unreachable!("not exercised")
        }

        async fn speech(
            &self,
            _model: &str,
            _credential: &Credential,
            _audio: &AudioInput,
            _params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            unreachable!("not exercised")
        }

        async fn transcription(
            &self,
            _model: &str,
            _credential: &Credential,
            _audio: &AudioInput,
            _params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            unreachable!("not exercised")
        }
    }

    /// Worker pool size 1, queue capacity 1, drop-excess on, worker
    /// blocked on a long-running mock. Third submission must reject
    /// immediately with QueueFull.
    #[tokio::test]
    async fn drop_excess_rejects_immediately_when_full() {
        let mut config = ProviderConfig::default();
        config.worker_concurrency = 1;
        config.queue_depth = 1;
        config.drop_excess = true;

        let pool = WorkerPool::spawn("blocking", config, Arc::new(BlockingProvider));
        let envelope_pool = Pool::new(3, 3, Envelope::default);

        let (e1, _r1) = chat_envelope(&envelope_pool);
        let (e2, _r2) = chat_envelope(&envelope_pool);
        let (e3, _r3) = chat_envelope(&envelope_pool);
        let credential = Credential::new("sk-test", 1.0);

        pool.enqueue(
            WorkItem { envelope: e1, credential: credential.clone(), cancel: CancellationToken::new() },
            CancellationToken::new(),
        )
        .await
        .unwrap();
        // Let the sole worker pick up e1 so the queue slot is free again but
        // the worker itself is occupied for the next 200ms.
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert_eq!(pool.in_flight(), 1);

        pool.enqueue(
            WorkItem { envelope: e2, credential: credential.clone(), cancel: CancellationToken::new() },
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let result = pool
            .enqueue(
                WorkItem { envelope: e3, credential, cancel: CancellationToken::new() },
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(Error::QueueFull { .. })));
        pool.shutdown(false).await;
    }

    /// Canceling an in-flight attempt's token releases the worker instead of
    /// leaving it blocked on the full 200ms provider delay: the reply
    /// channel resolves with `Canceled` almost immediately, and the worker
    /// is free to pick up the next queued envelope.
    #[tokio::test]
    async fn cancel_token_releases_worker_from_hung_provider_call() {
        let mut config = ProviderConfig::default();
        config.worker_concurrency = 1;
        config.queue_depth = 4;

        let pool = WorkerPool::spawn("blocking", config, Arc::new(BlockingProvider));
        let envelope_pool = Pool::new(2, 2, Envelope::default);

        let (e1, r1) = chat_envelope(&envelope_pool);
        let (e2, r2) = chat_envelope(&envelope_pool);
        let credential = Credential::new("sk-test", 1.0);
        let attempt_cancel = CancellationToken::new();

        pool.enqueue(
            WorkItem { envelope: e1, credential: credential.clone(), cancel: attempt_cancel.clone() },
            CancellationToken::new(),
        )
        .await
        .unwrap();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert_eq!(pool.in_flight(), 1);

        attempt_cancel.cancel();
        let (response, error) = r1.await.unwrap();
        assert!(response.is_none());
        assert!(matches!(error, Some(Error::Canceled { .. })));

        // The worker is free again well before the blocked call's 200ms
        // would have elapsed, so a fresh envelope completes normally.
        pool.enqueue(
            WorkItem { envelope: e2, credential, cancel: CancellationToken::new() },
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let (response, error) = r2.await.unwrap();
        assert!(error.is_none());
        assert!(response.is_some());
        pool.shutdown(true).await;
    }
}
