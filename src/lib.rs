//! Best-effort webhook notifications
//!
//! [`WebhookNotifier`] POSTs JSON payloads to a configured URL from spawned
//! tokio tasks and never reports failures to the caller. [`NotifyExtension`]
//! wires it into a host [`App`] from its settings.

pub mod config;
pub mod error;
pub mod extension;
pub mod metrics;
pub mod notifier;

pub use error::NotifyError;
pub use extension::{App, ExtensionRegistry, NotifyExtension, Settings, NOTIFIER_KEY};
pub use metrics::MetricsRegistry;
pub use notifier::{NoopNotifier, Notifier, WebhookNotifier};
