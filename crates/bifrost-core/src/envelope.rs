use bifrost_pool::Poolable;
use bifrost_provider_core::{Params, RequestInput, RequestKind, RequestSpec, Response};
use tokio::sync::oneshot;

use crate::error::Error;

/// What a worker writes to the envelope's reply channel exactly once per
/// attempt.
pub type Attempt = (Option<Response>, Option<Error>);

/// A single-use sender/receiver pair, pooled separately from the envelope
/// that carries the sender half across the worker boundary.
pub struct ReplyChannel {
    tx: Option<oneshot::Sender<Attempt>>,
    rx: Option<oneshot::Receiver<Attempt>>,
}

impl ReplyChannel {
    fn fresh() -> Self {
        let (tx, rx) = oneshot::channel();
        Self { tx: Some(tx), rx: Some(rx) }
    }

    pub fn take_sender(&mut self) -> oneshot::Sender<Attempt> {
        self.tx.take().expect("reply channel sender already taken this attempt")
    }

    pub fn take_receiver(&mut self) -> oneshot::Receiver<Attempt> {
        self.rx.take().expect("reply channel receiver already taken this attempt")
    }
}

impl Default for ReplyChannel {
    fn default() -> Self {
        Self::fresh()
    }
}

impl Poolable for ReplyChannel {
    fn reset(&mut self) {
        // A spent oneshot pair can't be reused; hand the next borrower a
        // fresh pair instead. Cheap enough that pooling this mostly just
        // amortizes the allocation bookkeeping, not the channel itself.
        *self = Self::fresh();
    }
}

/// The per-request record that carries spec, fallback list, and the worker
/// half of the reply channel through the pipeline and worker pool.
///
/// Exclusively owns its reply-channel sender for the duration of one
/// attempt; a worker borrows the envelope but must not retain it past
/// writing the reply.
pub struct Envelope {
    pub spec: RequestSpec,
    pub(crate) reply_tx: Option<oneshot::Sender<Attempt>>,
    /// Indices (into the pipeline's plugin list) of pre-hooks that actually
    /// ran this attempt, in run order — consumed in reverse for symmetric
    /// post-hook unwinding.
    pub(crate) ran_pre_hooks: Vec<usize>,
}

impl Envelope {
    pub fn populate(&mut self, spec: RequestSpec, reply_tx: oneshot::Sender<Attempt>) {
        self.spec = spec;
        self.reply_tx = Some(reply_tx);
        self.ran_pre_hooks.clear();
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            spec: RequestSpec {
                provider: String::new(),
                model: String::new(),
                kind: RequestKind::Chat,
                input: RequestInput::default(),
                params: Params::default(),
                fallbacks: Vec::new(),
            },
            reply_tx: None,
            ran_pre_hooks: Vec::new(),
        }
    }
}

impl Poolable for Envelope {
    fn reset(&mut self) {
        self.spec.provider.clear();
        self.spec.model.clear();
        self.spec.input = RequestInput::default();
        self.spec.params = Params::default();
        self.spec.fallbacks.clear();
        self.reply_tx = None;
        self.ran_pre_hooks.clear();
    }
}
