mod body;
mod dispatch;
mod metrics;
mod tool;

pub use dispatch::{chat_completions, text_completions};
pub use metrics::metrics;
pub use tool::execute_tool;
