use anyhow::Result;
use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webhook_notify::config::Config;
use webhook_notify::extension::{self, App, NotifyExtension, Settings, NOTIFY_TOKEN, NOTIFY_URL};
use webhook_notify::{MetricsRegistry, Notifier};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber with environment filter
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting webhook-notify v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let payload = config.parse_payload()?;

    let metrics = MetricsRegistry::new()?;
    let metrics_handle = config
        .metrics_socket_addr()?
        .map(|addr| metrics.spawn_server(addr));

    let mut settings = Settings::new();
    if let Some(url) = &config.notify_url {
        settings.set(NOTIFY_URL, url.clone());
    }
    if let Some(token) = &config.notify_token {
        settings.set(NOTIFY_TOKEN, token.clone());
    }
    let mut app = App::new(settings);
    NotifyExtension::new(None, None)
        .with_metrics(metrics.clone())
        .init_app(&mut app);

    match payload {
        Some(payload) => send_payload(&app, payload).await,
        None => info!("No payload given, nothing to send"),
    }

    info!(
        "Done: sent={}, failed={}",
        metrics.sent_total.get(),
        metrics.failed_total.get()
    );

    if let Some(handle) = metrics_handle {
        info!("Serving metrics until the process is stopped");
        if let Err(e) = handle.await {
            error!("Metrics server task failed: {}", e);
        }
    }

    Ok(())
}

/// Send one payload through the registered notifier and wait for the task
async fn send_payload(app: &App, payload: Value) {
    let Some(notifier) = extension::notifier(app) else {
        warn!("No notifier registered, payload dropped");
        return;
    };

    if let Some(handle) = notifier.notify(payload) {
        // Keep the process alive until the fire-and-forget send finishes
        if let Err(e) = handle.await {
            error!("Notification task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_payload_without_notifier() {
        let app = App::default();
        send_payload(&app, json!({"event": "dropped"})).await;
        assert!(app.extensions.is_empty());
    }

    #[tokio::test]
    async fn test_send_payload_waits_for_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let metrics = MetricsRegistry::default();
        let mut settings = Settings::new();
        settings.set(NOTIFY_URL, format!("{}/hook", server.uri()));
        let mut app = App::new(settings);
        NotifyExtension::new(None, None)
            .with_metrics(metrics.clone())
            .init_app(&mut app);

        send_payload(&app, json!({"event": "done"})).await;
        assert_eq!(metrics.sent_total.get(), 1.0);
    }
}
