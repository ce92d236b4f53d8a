use std::collections::HashMap;
use std::sync::Arc;

use bifrost_pool::Pool;
use bifrost_provider_core::{Credential, ProviderCapability, ProviderConfig, RequestKind, RequestSpec, Response};
use tracing::{info_span, Instrument};

use crate::context::InboundContext;
use crate::envelope::{Envelope, ReplyChannel};
use crate::error::Error;
use crate::mcp_hook::McpAugmenter;
use crate::plugin::{Plugin, PluginPipeline};
use crate::response_shell::ResponseShell;
use crate::selector::WeightedCredentialPool;
use crate::worker_pool::{WorkItem, WorkerPool};

struct DispatcherState {
    providers: HashMap<String, Arc<WorkerPool>>,
    selector: WeightedCredentialPool,
    plugins: PluginPipeline,
    mcp: Option<Arc<dyn McpAugmenter>>,
    envelope_pool: Arc<Pool<Envelope>>,
    reply_pool: Arc<Pool<ReplyChannel>>,
    response_shell_pool: Arc<Pool<ResponseShell>>,
}

/// Assembles a [`Dispatcher`] before the gateway starts serving traffic:
/// register every provider's worker pool and every plugin, then hand the
/// immutable, `Arc`-wrapped result to the HTTP layer.
pub struct DispatcherBuilder {
    providers: HashMap<String, Arc<WorkerPool>>,
    selector: WeightedCredentialPool,
    plugins: PluginPipeline,
    mcp: Option<Arc<dyn McpAugmenter>>,
    envelope_pool_size: usize,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            selector: WeightedCredentialPool::new(),
            plugins: PluginPipeline::new(),
            mcp: None,
            envelope_pool_size: 64,
        }
    }

    /// Registers a provider: spawns its worker pool and seeds the
    /// selector with its credential set. Registering the same id
    /// twice replaces both the pool and the credential snapshot.
    pub async fn register_provider(
        mut self,
        id: impl Into<String>,
        config: ProviderConfig,
        credentials: Vec<Credential>,
        capability: Arc<dyn ProviderCapability>,
    ) -> Self {
        let id = id.into();
        self.selector.set_credentials(id.clone(), credentials).await;
        let pool = WorkerPool::spawn(id.clone(), config, capability);
        self.providers.insert(id, pool);
        self
    }

    /// Registers a plugin at the end of the pipeline (registration order is
    /// pre-hook order; post-hooks unwind in reverse).
    pub fn register_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.register(plugin);
        self
    }

    /// Wires the MCP sub-engine's augmentation seam. Omitting this
    /// call leaves MCP disabled: chat requests pass through with whatever
    /// tool list the caller already supplied.
    pub fn with_mcp(mut self, mcp: Arc<dyn McpAugmenter>) -> Self {
        self.mcp = Some(mcp);
        self
    }

    pub fn with_envelope_pool_size(mut self, size: usize) -> Self {
        self.envelope_pool_size = size.max(1);
        self
    }

    pub fn build(self) -> Dispatcher {
        let soft_cap = self.envelope_pool_size * 2;
        Dispatcher {
            state: Arc::new(DispatcherState {
                providers: self.providers,
                selector: self.selector,
                plugins: self.plugins,
                mcp: self.mcp,
                envelope_pool: Pool::new(self.envelope_pool_size, soft_cap, Envelope::default),
                reply_pool: Pool::new(self.envelope_pool_size, soft_cap, ReplyChannel::default),
                response_shell_pool: Pool::new(self.envelope_pool_size, soft_cap, ResponseShell::default),
            }),
        }
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry point composing the Plugin Pipeline, MCP tool injection, Worker
/// Pool submission, and fallback cascade.
///
/// A cheap `Arc`-backed clone handle so the HTTP layer can
/// hold one per connection without synchronizing on a shared mutex.
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<DispatcherState>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.state.providers.keys().map(String::as_str)
    }

    /// Submit(kind, spec) — never panics, always resolves to a `Response` or
    /// a structured [`Error`].
    pub async fn submit(&self, ctx: &InboundContext, kind: RequestKind, spec: RequestSpec) -> Result<Response, Error> {
        if spec.kind != kind {
            return Err(Error::invalid_request("request kind does not match spec.kind"));
        }
        spec.validate().map_err(|err| Error::invalid_request(err.to_string()))?;

        let span = info_span!(
            "bifrost.dispatch",
            request_id = %ctx.request_id(),
            provider = %spec.provider,
            model = %spec.model,
        );
        self.submit_loop(ctx, spec).instrument(span).await
    }

    /// Pre-hook, dispatch, post-hook, and fallback-pop, repeated once per
    /// attempt until a final (non-fallback-eligible) outcome is reached.
    async fn submit_loop(&self, ctx: &InboundContext, mut spec: RequestSpec) -> Result<Response, Error> {
        loop {
            let run = self.state.plugins.run_pre_hooks(ctx, spec.clone()).await;
            spec = run.spec;

            let (response, error) = match run.short_circuit {
                Some(short_circuit) => short_circuit,
                None => {
                    let mut attempt_spec = spec.clone();
                    if let Some(mcp) = &self.state.mcp {
                        if attempt_spec.kind == RequestKind::Chat {
                            attempt_spec = mcp.augment_request(ctx, attempt_spec).await;
                        }
                    }
                    match self.dispatch_once(ctx, &attempt_spec).await {
                        Ok(response) => (Some(response), None),
                        Err(error) => (None, Some(error)),
                    }
                }
            };

            let (response, error) = self.state.plugins.run_post_hooks(ctx, &run.ran, response, error).await;

            match error {
                Some(error) if !error.is_empty() => {
                    // A post-hook that both mutates the response and returns
                    // a non-empty error is treated as invalidate — the error
                    // wins and the response (if any) is discarded.
                    if error.fallbacks_allowed() && !spec.fallbacks.is_empty() {
                        if let Some(next) = spec.pop_fallback() {
                            spec.provider = next.provider;
                            spec.model = next.model;
                            continue;
                        }
                    }
                    return Err(error);
                }
                _ => {
                    let Some(mut response) = response else {
                        return Err(Error::internal("post-hook chain produced neither a response nor an error"));
                    };
                    self.finish_response(&mut response);
                    return Ok(response);
                }
            }
        }
    }

    /// Credential selection, worker pool enqueue, and the reply-channel
    /// await, wrapped in the provider's configured timeout.
    async fn dispatch_once(&self, ctx: &InboundContext, spec: &RequestSpec) -> Result<Response, Error> {
        let provider = spec.provider.clone();
        let Some(pool) = self.state.providers.get(&provider).cloned() else {
            return Err(Error::invalid_request(format!("unknown provider \"{provider}\"")));
        };
        let credential = self.state.selector.select(&provider, &spec.model).await?;

        let mut envelope = self.state.envelope_pool.get();
        let mut channel = self.state.reply_pool.get();
        let reply_tx = channel.take_sender();
        let reply_rx = channel.take_receiver();
        envelope.populate(spec.clone(), reply_tx);

        let cancel = ctx.child_token();
        let timeout = pool.request_timeout();
        let cancel_for_attempt = cancel.clone();
        let pool_for_attempt = Arc::clone(&pool);

        let attempt = async move {
            let work_cancel = cancel_for_attempt.clone();
            pool_for_attempt
                .enqueue(WorkItem { envelope, credential, cancel: work_cancel }, cancel_for_attempt.clone())
                .await?;
            tokio::select! {
                biased;
                _ = cancel_for_attempt.cancelled() => Err(Error::canceled()),
                result = reply_rx => match result {
                    Ok((Some(response), None)) => Ok(response),
                    Ok((None, Some(error))) => Err(error),
                    Ok(_) => Err(Error::internal("worker wrote an invalid (response, error) pair")),
                    Err(_) => Err(Error::internal("worker dropped the reply channel without responding")),
                },
            }
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(Error::provider_timeout(provider))
            }
        }
    }

    /// Lets the final response's `choices` allocation inherit a pooled
    /// response-shell's spare capacity: an optimization only, never a
    /// correctness mechanism — `response` keeps its elements either way.
    fn finish_response(&self, response: &mut Response) {
        let mut shell = self.state.response_shell_pool.get();
        shell.absorb(response);
    }

    /// Runs every registered plugin's `cleanup` once, in reverse
    /// registration order.
    pub async fn shutdown(&self) {
        self.state.plugins.cleanup_all().await;
        for pool in self.state.providers.values() {
            pool.shutdown(true).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use bifrost_provider_core::{
        AudioInput, EmbeddingInput, ExtraFields, FallbackTarget, FinishReason, Message, Params, ProviderError,
        ProviderErrorKind, ProviderResult, RequestInput, Usage,
    };

    use super::*;
    use crate::plugin::{PreHookOutcome, ShortCircuit};

    struct ScriptedProvider {
        name: &'static str,
        outcome: ProviderResult<()>,
    }

    #[async_trait]
    impl ProviderCapability for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn chat_completion(
            &self,
            model: &str,
            _credential: &Credential,
            _messages: &[Message],
            params: &Params,
            _config: &ProviderConfig,
        ) -> ProviderResult<Response> {
            self.outcome.clone()?;
            Ok(Response::single_choice(
                "id",
                "chat.completion",
                model,
                0,
                Message::assistant("Hi"),
                FinishReason::Stop,
                Usage { prompt_tokens: 1, completion_tokens: 1, total_tokens: 2 },
                ExtraFields {
                    provider: self.name.into(),
                    model_params: params.clone(),
                    latency: Duration::ZERO,
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

    fn chat_spec(provider: &str, model: &str, fallbacks: Vec<FallbackTarget>) -> RequestSpec {
        RequestSpec {
            provider: provider.into(),
            model: model.into(),
            kind: RequestKind::Chat,
            input: RequestInput {
                messages: Some(vec![Message::user("Hello")]),
                ..Default::default()
            },
            params: Params::default(),
            fallbacks,
        }
    }

    fn fast_config() -> ProviderConfig {
        let mut config = ProviderConfig::default();
        config.worker_concurrency = 2;
        config.queue_depth = 8;
        config.max_retries = 0;
        config
    }

    /// Happy path, no plugins, no fallbacks.
    #[tokio::test]
    async fn happy_path_returns_response_from_named_provider() {
        let dispatcher = Dispatcher::builder()
            .register_provider(
                "openai",
                fast_config(),
                vec![Credential::new("sk-test", 1.0).with_models(["gpt-4o"])],
                Arc::new(ScriptedProvider { name: "openai", outcome: Ok(()) }),
            )
            .await
            .build();

        let ctx = InboundContext::new();
        let response = dispatcher
            .submit(&ctx, RequestKind::Chat, chat_spec("openai", "gpt-4o", vec![]))
            .await
            .unwrap();

        assert_eq!(response.extra_fields.provider, "openai");
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.usage.total_tokens, 2);
    }

    struct CountingPlugin {
        name: &'static str,
        pre: AtomicUsize,
        post: AtomicUsize,
    }

    impl CountingPlugin {
        fn new(name: &'static str) -> Self {
            Self { name, pre: AtomicUsize::new(0), post: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Plugin for CountingPlugin {
        fn name(&self) -> &str {
            self.name
        }

        async fn pre_hook(&self, _ctx: &InboundContext, spec: RequestSpec) -> Result<PreHookOutcome, Error> {
            self.pre.fetch_add(1, Ordering::SeqCst);
            Ok(PreHookOutcome::Continue(spec))
        }

        async fn post_hook(
            &self,
            _ctx: &InboundContext,
            response: Option<Response>,
            error: Option<Error>,
        ) -> (Option<Response>, Option<Error>) {
            self.post.fetch_add(1, Ordering::SeqCst);
            (response, error)
        }
    }

    /// Fallback on a non-retryable upstream 502. openai is attempted
    /// exactly once; anthropic succeeds; the plugin's pre/post hooks each
    /// ran twice (once per attempt).
    #[tokio::test]
    async fn fallback_retries_next_provider_on_non_retryable_upstream_error() {
        let plugin = Arc::new(CountingPlugin::new("metrics"));

        let dispatcher = Dispatcher::builder()
            .register_plugin(plugin.clone())
            .register_provider(
                "openai",
                fast_config(),
                vec![Credential::new("sk-openai", 1.0)],
                Arc::new(ScriptedProvider {
                    name: "openai",
                    outcome: Err(ProviderError::new(502, ProviderErrorKind::Upstream, "bad gateway", false)),
                }),
            )
            .await
            .register_provider(
                "anthropic",
                fast_config(),
                vec![Credential::new("sk-anthropic", 1.0)],
                Arc::new(ScriptedProvider { name: "anthropic", outcome: Ok(()) }),
            )
            .await
            .build();

        let ctx = InboundContext::new();
        let fallbacks = vec![FallbackTarget { provider: "anthropic".into(), model: "claude-3".into() }];
        let response = dispatcher
            .submit(&ctx, RequestKind::Chat, chat_spec("openai", "gpt-4o", fallbacks))
            .await
            .unwrap();

        assert_eq!(response.extra_fields.provider, "anthropic");
        assert_eq!(plugin.pre.load(Ordering::SeqCst), 2);
        assert_eq!(plugin.post.load(Ordering::SeqCst), 2);
    }

    struct AuthPlugin;

    #[async_trait]
    impl Plugin for AuthPlugin {
        fn name(&self) -> &str {
            "auth"
        }

        async fn pre_hook(&self, _ctx: &InboundContext, _spec: RequestSpec) -> Result<PreHookOutcome, Error> {
            Ok(PreHookOutcome::ShortCircuit(ShortCircuit::Error(Error::PluginShortCircuit {
                plugin: "auth".into(),
                status: 401,
                message: "missing api key".into(),
                fallbacks_allowed: false,
            })))
        }

        async fn post_hook(
            &self,
            _ctx: &InboundContext,
            response: Option<Response>,
            error: Option<Error>,
        ) -> (Option<Response>, Option<Error>) {
            (response, error)
        }
    }

    /// A plugin short-circuit with `fallbacks_allowed: false` never
    /// calls the provider and ignores the fallback list entirely.
    #[tokio::test]
    async fn auth_short_circuit_ignores_fallback_list() {
        let dispatcher = Dispatcher::builder()
            .register_plugin(Arc::new(AuthPlugin))
            .register_provider(
                "openai",
                fast_config(),
                vec![Credential::new("sk-openai", 1.0)],
                Arc::new(ScriptedProvider { name: "openai", outcome: Ok(()) }),
            )
            .await
            .build();

        let ctx = InboundContext::new();
        let fallbacks = vec![FallbackTarget { provider: "openai".into(), model: "gpt-4o".into() }];
        let err = dispatcher
            .submit(&ctx, RequestKind::Chat, chat_spec("openai", "gpt-4o", fallbacks))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 401);
    }

    struct RecoveringPlugin;

    #[async_trait]
    impl Plugin for RecoveringPlugin {
        fn name(&self) -> &str {
            "recover"
        }

        async fn pre_hook(&self, _ctx: &InboundContext, spec: RequestSpec) -> Result<PreHookOutcome, Error> {
            Ok(PreHookOutcome::Continue(spec))
        }

        async fn post_hook(
            &self,
            _ctx: &InboundContext,
            _response: Option<Response>,
            error: Option<Error>,
        ) -> (Option<Response>, Option<Error>) {
            assert!(error.is_some());
            (
                Some(Response::single_choice(
                    "recovered",
                    "chat.completion",
                    "gpt-4o",
                    0,
                    Message::assistant("fallback text"),
                    FinishReason::Stop,
                    Usage::default(),
                    ExtraFields {
                        provider: "recover-plugin".into(),
                        model_params: Params::default(),
                        latency: Duration::ZERO,
                        raw_response: None,
                        chat_history: None,
                    },
                )),
                Some(Error::empty()),
            )
        }
    }

    /// Only the "truly empty" sentinel recovers a failed attempt.
    #[tokio::test]
    async fn post_hook_empty_sentinel_recovers_failed_attempt() {
        let dispatcher = Dispatcher::builder()
            .register_plugin(Arc::new(RecoveringPlugin))
            .register_provider(
                "openai",
                fast_config(),
                vec![Credential::new("sk-openai", 1.0)],
                Arc::new(ScriptedProvider {
                    name: "openai",
                    outcome: Err(ProviderError::new(500, ProviderErrorKind::Internal, "boom", false)),
                }),
            )
            .await
            .build();

        let ctx = InboundContext::new();
        let response = dispatcher
            .submit(&ctx, RequestKind::Chat, chat_spec("openai", "gpt-4o", vec![]))
            .await
            .unwrap();
        assert_eq!(response.id, "recovered");
    }

    /// An unreachable/unknown final fallback still surfaces as a final
    /// error, not an infinite loop.
    #[tokio::test]
    async fn exhausted_fallback_list_is_final() {
        let dispatcher = Dispatcher::builder()
            .register_provider(
                "openai",
                fast_config(),
                vec![Credential::new("sk-openai", 1.0)],
                Arc::new(ScriptedProvider {
                    name: "openai",
                    outcome: Err(ProviderError::new(503, ProviderErrorKind::Overloaded, "overloaded", false)),
                }),
            )
            .await
            .build();

        let ctx = InboundContext::new();
        let err = dispatcher
            .submit(&ctx, RequestKind::Chat, chat_spec("openai", "gpt-4o", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn unknown_provider_is_invalid_request() {
        let dispatcher = Dispatcher::builder().build();
        let ctx = InboundContext::new();
        let err = dispatcher
            .submit(&ctx, RequestKind::Chat, chat_spec("does-not-exist", "gpt-4o", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
