//! Outbound email: composition from templates and delivery sinks.

use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use intake_core::defaults::{FROM_EMAIL, PENDING_SUMMARY, PRODUCT_NAME};
use intake_core::{EmailMessage, Error, NotificationSink, Result};
use intake_inference::{clean_summary, first_paragraph, paragraphs};

pub const DEFAULT_RESEND_URL: &str = "https://api.resend.com";

/// Timeout for a single delivery request, in seconds.
pub const EMAIL_TIMEOUT_SECS: u64 = 15;

// =============================================================================
// TEMPLATES
// =============================================================================

#[derive(Template)]
#[template(path = "completion.html")]
struct CompletionHtml<'a> {
    client_name: &'a str,
    file_name: &'a str,
    preview: &'a str,
    link: &'a str,
    product_name: &'a str,
}

#[derive(Template)]
#[template(path = "completion.txt")]
struct CompletionText<'a> {
    client_name: &'a str,
    file_name: &'a str,
    preview: &'a str,
    link: &'a str,
    product_name: &'a str,
}

#[derive(Template)]
#[template(path = "share.html")]
struct ShareHtml<'a> {
    client_name: &'a str,
    paragraphs: Vec<&'a str>,
    link: &'a str,
    product_name: &'a str,
}

#[derive(Template)]
#[template(path = "share.txt")]
struct ShareText<'a> {
    client_name: &'a str,
    summary: &'a str,
    link: &'a str,
    product_name: &'a str,
}

fn render_error(e: askama::Error) -> Error {
    Error::Internal(format!("Failed to render email template: {}", e))
}

/// Builds the two emails the portal sends, with links rooted at `app_url`.
#[derive(Debug, Clone)]
pub struct EmailComposer {
    app_url: String,
}

impl EmailComposer {
    pub fn new(app_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Owner-facing report link.
    pub fn document_link(&self, document_id: Uuid) -> String {
        format!("{}/documents/{}", self.app_url, document_id)
    }

    /// Unauthenticated report link.
    pub fn shared_link(&self, share_token: Uuid) -> String {
        format!("{}/shared/{}", self.app_url, share_token)
    }

    /// "Analysis Complete" email to the document owner, previewing the first paragraph.
    pub fn completion(
        &self,
        to: &str,
        client_name: &str,
        file_name: &str,
        document_id: Uuid,
        summary: &str,
    ) -> Result<EmailMessage> {
        let preview = first_paragraph(summary);
        let link = self.document_link(document_id);

        let html = CompletionHtml {
            client_name,
            file_name,
            preview: &preview,
            link: &link,
            product_name: PRODUCT_NAME,
        }
        .render()
        .map_err(render_error)?;
        let text = CompletionText {
            client_name,
            file_name,
            preview: &preview,
            link: &link,
            product_name: PRODUCT_NAME,
        }
        .render()
        .map_err(render_error)?;

        Ok(EmailMessage {
            to: to.to_string(),
            subject: format!("Analysis Complete: {}", client_name),
            html,
            text,
        })
    }

    /// "Analysis Report" email to an arbitrary recipient with the full summary.
    pub fn share(
        &self,
        to: &str,
        client_name: &str,
        share_token: Uuid,
        summary: Option<&str>,
    ) -> Result<EmailMessage> {
        let summary = summary
            .map(clean_summary)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| PENDING_SUMMARY.to_string());
        let link = self.shared_link(share_token);

        let html = ShareHtml {
            client_name,
            paragraphs: paragraphs(&summary),
            link: &link,
            product_name: PRODUCT_NAME,
        }
        .render()
        .map_err(render_error)?;
        let text = ShareText {
            client_name,
            summary: &summary,
            link: &link,
            product_name: PRODUCT_NAME,
        }
        .render()
        .map_err(render_error)?;

        Ok(EmailMessage {
            to: to.to_string(),
            subject: format!("Analysis Report: {}", client_name),
            html,
            text,
        })
    }
}

// =============================================================================
// SINKS
// =============================================================================

/// Resend delivery settings.
#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub base_url: String,
    pub api_key: String,
    pub from_email: String,
}

impl ResendConfig {
    /// `None` when `RESEND_API_KEY` is unset or empty.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `RESEND_API_KEY` | (none) |
    /// | `RESEND_BASE_URL` | `https://api.resend.com` |
    /// | `RESEND_FROM_EMAIL` | `noreply@intake.local` |
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("RESEND_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())?;
        Some(Self {
            base_url: std::env::var("RESEND_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_RESEND_URL.to_string()),
            api_key,
            from_email: std::env::var("RESEND_FROM_EMAIL")
                .unwrap_or_else(|_| FROM_EMAIL.to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendErrorResponse {
    #[serde(default)]
    message: String,
}

/// Delivers through the Resend HTTP API.
pub struct ResendMailer {
    client: Client,
    config: ResendConfig,
}

impl ResendMailer {
    pub fn new(config: ResendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(EMAIL_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl NotificationSink for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let url = format!("{}/emails", self.config.base_url.trim_end_matches('/'));
        let body = SendEmailRequest {
            from: &self.config.from_email,
            to: vec![message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Notification(format!("Email request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ResendErrorResponse>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(Error::Notification(format!(
                "Email provider returned {}: {}",
                status, message
            )));
        }

        let sent: SendEmailResponse = response
            .json()
            .await
            .map_err(|e| Error::Notification(format!("Failed to parse email response: {}", e)))?;
        debug!(
            subsystem = "jobs",
            component = "resend",
            op = "send",
            email_id = %sent.id,
            "Email accepted"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "resend"
    }
}

/// Logs messages instead of sending them. Used when no provider is configured.
pub struct LogOnlySink;

#[async_trait]
impl NotificationSink for LogOnlySink {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            subsystem = "jobs",
            component = "log_only_sink",
            op = "send",
            to = %message.to,
            subject = %message.subject,
            "Email delivery disabled; message logged only"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log_only"
    }
}

/// Resend when configured, otherwise the log-only sink.
pub fn sink_from_env() -> Result<std::sync::Arc<dyn NotificationSink>> {
    match ResendConfig::from_env() {
        Some(config) => Ok(std::sync::Arc::new(ResendMailer::new(config)?)),
        None => Ok(std::sync::Arc::new(LogOnlySink)),
    }
}
