use std::mem;

use bifrost_pool::Poolable;
use bifrost_provider_core::{Choice, Response};

/// A reusable choice buffer for assembling the final [`Response`]. The
/// dispatcher swaps a freshly-dequeued provider `Response`'s `choices` Vec
/// into a pooled shell's buffer (reusing its allocation) rather than
/// allocating a new Vec per attempt, then swaps the filled buffer back out
/// when handing the response to the caller.
#[derive(Default)]
pub struct ResponseShell {
    choices: Vec<Choice>,
}

impl ResponseShell {
    /// Moves `response.choices`' elements onto whatever spare capacity this
    /// shell already holds (from a prior, now-reset cycle), then swaps the
    /// combined buffer back into `response`. Net effect: `response.choices`
    /// keeps its elements but, over repeated pool cycles, inherits capacity
    /// instead of reallocating from scratch each time; the shell is left
    /// holding the drained, soon-to-be-reset buffer.
    pub fn absorb(&mut self, response: &mut Response) {
        self.choices.append(&mut response.choices);
        mem::swap(&mut self.choices, &mut response.choices);
    }
}

impl Poolable for ResponseShell {
    fn reset(&mut self) {
        self.choices.clear();
    }
}

#[cfg(test)]
mod tests {
    use bifrost_provider_core::{ExtraFields, FinishReason, Message, Usage};

    use super::*;

    fn sample_response() -> Response {
        Response::single_choice(
            "id-1",
            "chat.completion",
            "gpt-4o",
            0,
            Message::assistant("hi"),
            FinishReason::Stop,
            Usage::default(),
            ExtraFields {
                provider: "openai".into(),
                model_params: Default::default(),
                latency: std::time::Duration::ZERO,
                raw_response: None,
                chat_history: None,
            },
        )
    }

    #[test]
    fn absorb_keeps_elements_in_the_response() {
        let mut shell = ResponseShell::default();
        let mut first = sample_response();
        shell.absorb(&mut first);
        assert_eq!(first.choices.len(), 1);
        assert!(shell.choices.is_empty());

        shell.reset();
        let mut second = sample_response();
        shell.absorb(&mut second);
        assert_eq!(second.choices.len(), 1);
        assert!(shell.choices.is_empty());
    }

    #[test]
    fn absorb_lets_response_inherit_shells_spare_capacity() {
        let mut shell = ResponseShell::default();
        shell.choices.reserve(8);
        let reserved = shell.choices.capacity();

        let mut response = sample_response();
        shell.absorb(&mut response);
        assert_eq!(response.choices.len(), 1);
        assert!(response.choices.capacity() >= reserved);
    }
}
