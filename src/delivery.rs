//! Formats the assembled digest into an HTML email body and delivers it
//! over SMTP. Everything here sits downstream of the core pipeline; it
//! consumes `DigestEntry` and `RunReport` and owns nothing else.

use crate::config::EmailConfig;
use crate::types::{DigestEntry, DigestError, Result, RunReport};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use tracing::info;

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; margin: 0; padding: 20px; background-color: #f9f9f9; }
        .container { max-width: 600px; margin: auto; background: white; padding: 20px; box-shadow: 0 0 10px rgba(0, 0, 0, 0.1); }
        h2 { color: #333; border-bottom: 1px solid #d3d3d3; padding-bottom: 10px; }
        .news-item { margin-bottom: 15px; }
        .news-title a { color: #000; text-decoration: none; font-weight: bold; font-size: 16px; }
        .news-url { color: #666; margin-top: 5px; font-size: 14px; }
        .news-summary { color: #333; margin-top: 5px; font-size: 16px; }
        .sources-note { color: #999; margin-top: 20px; font-size: 12px; }
"#;

/// Renders the digest as a self-contained HTML document. Titles, URLs and
/// summaries are all escaped; a footer notes degraded sources and short
/// digests instead of hiding them.
pub fn render_html(entries: &[DigestEntry], report: &RunReport) -> String {
    let mut html = String::new();
    html.push_str("<html>\n<head>\n    <meta charset=\"UTF-8\">\n    <title>Your news digest</title>\n    <style>");
    html.push_str(STYLE);
    html.push_str("    </style>\n</head>\n<body>\n    <div class=\"container\">\n        <h2>Your news digest</h2>\n");

    if entries.is_empty() {
        html.push_str("        <p>No stories qualified for this digest.</p>\n");
    }

    for entry in entries {
        let item = &entry.entry.cluster.representative;
        let title = html_escape::encode_text(&item.title);
        html.push_str("        <div class=\"news-item\">\n");
        match &item.url {
            Some(url) => {
                let href = html_escape::encode_double_quoted_attribute(url);
                let shown_url = html_escape::encode_text(url);
                html.push_str(&format!(
                    "            <div class=\"news-title\"><a href=\"{}\" target=\"_blank\">{}</a></div>\n",
                    href, title
                ));
                html.push_str(&format!(
                    "            <div class=\"news-url\">{}</div>\n",
                    shown_url
                ));
            }
            None => {
                html.push_str(&format!(
                    "            <div class=\"news-title\">{}</div>\n",
                    title
                ));
            }
        }
        if let Some(summary) = &entry.summary {
            html.push_str(&format!(
                "            <div class=\"news-summary\">{}</div>\n",
                html_escape::encode_text(summary)
            ));
        }
        html.push_str("        </div>\n");
    }

    let mut notes: Vec<String> = Vec::new();
    let failed: Vec<String> = report
        .failed_sources()
        .map(|s| s.source.label())
        .collect();
    if !failed.is_empty() {
        notes.push(format!(
            "Some sources could not be reached this run: {}.",
            failed.join(", ")
        ));
    }
    if report.below_minimum {
        notes.push("Fewer stories qualified than usual, so this digest is shorter.".to_string());
    }
    if !notes.is_empty() {
        html.push_str(&format!(
            "        <div class=\"sources-note\">{}</div>\n",
            html_escape::encode_text(&notes.join(" "))
        ));
    }

    html.push_str("    </div>\n</body>\n</html>\n");
    html
}

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    /// Builds a sender from config plus environment credentials
    /// (`SMTP_USER` / `SMTP_PASS`; `SMTP_HOST` when the config leaves the
    /// host unset).
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let host = config
            .smtp_host
            .clone()
            .or_else(|| std::env::var("SMTP_HOST").ok())
            .ok_or_else(|| DigestError::Config("SMTP host not configured".to_string()))?;
        let user = std::env::var("SMTP_USER")
            .map_err(|_| DigestError::Config("SMTP_USER missing from environment".to_string()))?;
        let pass = std::env::var("SMTP_PASS")
            .map_err(|_| DigestError::Config("SMTP_PASS missing from environment".to_string()))?;

        let from: Mailbox = config
            .from
            .as_deref()
            .ok_or_else(|| DigestError::Config("email.from not configured".to_string()))?
            .parse()
            .map_err(|e| DigestError::Config(format!("invalid email.from: {}", e)))?;
        let to: Mailbox = config
            .to
            .as_deref()
            .ok_or_else(|| DigestError::Config("email.to not configured".to_string()))?
            .parse()
            .map_err(|e| DigestError::Config(format!("invalid email.to: {}", e)))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .map_err(|e| DigestError::Email(format!("invalid SMTP host {}: {}", host, e)))?
            .credentials(Credentials::new(user, pass))
            .build();

        Ok(Self { mailer, from, to })
    }

    pub async fn send(&self, subject: &str, html_body: String) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_HTML)
            .body(html_body)
            .map_err(|e| DigestError::Email(format!("failed to build message: {}", e)))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| DigestError::Email(e.to_string()))?;
        info!(to = %self.to, "digest email sent");
        Ok(())
    }
}
