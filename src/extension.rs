//! Host application integration
//!
//! A host [`App`] carries string settings and a registry of shared services.
//! [`NotifyExtension`] reads the notify settings and, when a URL is present,
//! publishes a [`WebhookNotifier`] under [`NOTIFIER_KEY`].

use crate::metrics::MetricsRegistry;
use crate::notifier::WebhookNotifier;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Settings key holding the webhook URL
pub const NOTIFY_URL: &str = "NOTIFY_URL";
/// Settings key holding the webhook token
pub const NOTIFY_TOKEN: &str = "NOTIFY_TOKEN";
/// Registry key the notifier is published under
pub const NOTIFIER_KEY: &str = "notifier";

/// Host configuration values
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Insert `value` only if `key` has no value yet
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }
}

/// Shared service instances keyed by name
#[derive(Default)]
pub struct ExtensionRegistry {
    entries: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a service, replacing any previous one under the same key
    pub fn insert<T: Any + Send + Sync>(&mut self, key: &'static str, service: Arc<T>) {
        self.entries.insert(key, service);
    }

    /// Look up a service by key, if it exists and has type `T`
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.entries
            .get(key)
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Host application state extensions attach to
#[derive(Default)]
pub struct App {
    pub settings: Settings,
    pub extensions: ExtensionRegistry,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            extensions: ExtensionRegistry::new(),
        }
    }
}

/// Registers a webhook notifier with a host [`App`]
#[derive(Default)]
pub struct NotifyExtension {
    url: Option<String>,
    token: Option<String>,
    metrics: Option<MetricsRegistry>,
    service: Option<Arc<WebhookNotifier>>,
}

impl NotifyExtension {
    /// Create the extension with fallback URL and token; nothing is registered yet
    pub fn new(url: Option<String>, token: Option<String>) -> Self {
        Self {
            url,
            token,
            metrics: None,
            service: None,
        }
    }

    /// Have the installed notifier report into `metrics`
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create the extension and register it with `app` right away
    pub fn with_app(app: &mut App, url: Option<String>, token: Option<String>) -> Self {
        let mut extension = Self::new(url, token);
        extension.init_app(app);
        extension
    }

    pub fn init_app(&mut self, app: &mut App) {
        if let Some(url) = &self.url {
            app.settings.set_default(NOTIFY_URL, url.clone());
        }
        if let Some(token) = &self.token {
            app.settings.set_default(NOTIFY_TOKEN, token.clone());
        }

        let url = app.settings.get(NOTIFY_URL).filter(|url| !url.is_empty());
        let Some(url) = url else {
            warn!("Skipping notifications, NOTIFY_URL missing in .env");
            return;
        };

        let token = app.settings.get(NOTIFY_TOKEN);
        info!("Enabling notifications to URL {}", url);
        info!("Token found: {}", token.is_some());

        let mut service = WebhookNotifier::new(Some(url.to_string()), token.map(str::to_string));
        if let Some(metrics) = &self.metrics {
            service = service.with_metrics(metrics.clone());
        }
        let service = Arc::new(service);
        app.extensions.insert(NOTIFIER_KEY, Arc::clone(&service));
        self.service = Some(service);
    }

    /// Notifier installed by the last successful `init_app`
    pub fn service(&self) -> Option<&Arc<WebhookNotifier>> {
        self.service.as_ref()
    }
}

/// Look up the notifier registered with `app`
pub fn notifier(app: &App) -> Option<Arc<WebhookNotifier>> {
    app.extensions.get::<WebhookNotifier>(NOTIFIER_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_default_keeps_existing_value() {
        let mut settings = Settings::new();
        settings.set(NOTIFY_URL, "http://configured");
        settings.set_default(NOTIFY_URL, "http://fallback");
        settings.set_default(NOTIFY_TOKEN, "token");

        assert_eq!(settings.get(NOTIFY_URL), Some("http://configured"));
        assert_eq!(settings.get(NOTIFY_TOKEN), Some("token"));
    }

    #[test]
    fn test_registry_downcast() {
        let mut registry = ExtensionRegistry::new();
        registry.insert("answer", Arc::new(42u32));

        assert_eq!(registry.get::<u32>("answer").as_deref(), Some(&42));
        assert!(registry.get::<String>("answer").is_none());
        assert!(registry.get::<u32>("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_url_registers_nothing() {
        let mut app = App::default();
        let extension = NotifyExtension::with_app(&mut app, None, Some("token".to_string()));

        assert!(extension.service().is_none());
        assert!(app.extensions.is_empty());
        assert!(notifier(&app).is_none());
    }

    #[test]
    fn test_empty_url_registers_nothing() {
        let mut settings = Settings::new();
        settings.set(NOTIFY_URL, "");
        let mut app = App::new(settings);

        let extension =
            NotifyExtension::with_app(&mut app, Some("http://ignored".to_string()), None);

        assert!(extension.service().is_none());
        assert!(!app.extensions.contains(NOTIFIER_KEY));
    }

    #[test]
    fn test_url_registers_one_notifier() {
        let mut app = App::default();
        let extension = NotifyExtension::with_app(
            &mut app,
            Some("http://localhost:8080/hook".to_string()),
            Some("token".to_string()),
        );

        assert_eq!(app.extensions.len(), 1);
        let registered = notifier(&app).unwrap();
        assert!(Arc::ptr_eq(&registered, extension.service().unwrap()));
        assert_eq!(registered.url(), Some("http://localhost:8080/hook"));
        assert!(registered.has_token());
    }

    #[test]
    fn test_app_settings_override_defaults() {
        let mut settings = Settings::new();
        settings.set(NOTIFY_URL, "http://from-settings/hook");
        let mut app = App::new(settings);

        NotifyExtension::with_app(&mut app, Some("http://from-default/hook".to_string()), None);

        let registered = notifier(&app).unwrap();
        assert_eq!(registered.url(), Some("http://from-settings/hook"));
        assert!(!registered.has_token());
    }

    #[test]
    fn test_new_defers_registration() {
        let mut app = App::default();
        let mut extension = NotifyExtension::new(Some("http://localhost/hook".to_string()), None);
        assert!(app.extensions.is_empty());

        extension.init_app(&mut app);
        assert!(notifier(&app).is_some());
    }

    #[test]
    fn test_notifier_reports_into_extension_metrics() {
        let metrics = MetricsRegistry::default();
        let mut app = App::default();
        NotifyExtension::new(Some("http://localhost/hook".to_string()), None)
            .with_metrics(metrics.clone())
            .init_app(&mut app);

        let registered = notifier(&app).unwrap();
        registered.metrics().skipped_total.inc();
        assert_eq!(metrics.skipped_total.get(), 1.0);
    }
}
