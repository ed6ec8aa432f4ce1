//! Concrete adapters and process wiring for the ticket triage engine.

pub mod classifier;
pub mod config;
pub mod notifier;
pub mod runtime;

#[cfg(test)]
mod test_support;

pub use classifier::LlmClassifier;
pub use config::{LlmConfig, MailConfig, WorkerConfig};
pub use notifier::{LogNotifier, RelayNotifier};
