//! Illustrative provider capability implementations. These stand in for the real wire encoders the
//! specification places out of scope: one network-free echo mock and two
//! differently-shaped HTTP-backed capabilities demonstrating that the core
//! never needs to know which shape it's talking to.

mod anthropic_shaped;
mod error_map;
mod mock;
mod openai_shaped;

pub use anthropic_shaped::AnthropicShapedCapability;
pub use mock::MockCapability;
pub use openai_shaped::OpenAiShapedCapability;
