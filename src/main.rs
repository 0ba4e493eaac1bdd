use dotenvy::dotenv;
use media_relay_bot::config::Settings;
use media_relay_bot::runner::run_bot;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "media_relay_bot=info,teloxide=warn,reqwest=warn,hyper=warn";
const DEBUG_LOG_FILTER: &str = "media_relay_bot=debug,teloxide=info,reqwest=info,hyper=warn";

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    rapid_env: Regex,
    rapid_header: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            rapid_env: Regex::new(r"RAPID_API_KEY=[^\s&]+")?,
            rapid_header: Regex::new(r#"(?i)(x-rapidapi-key["']?\s*[:=]\s*["']?)[A-Za-z0-9_-]+"#)?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .rapid_env
            .replace_all(&output, "RAPID_API_KEY=[MASKED]")
            .to_string();
        output = self
            .rapid_header
            .replace_all(&output, "${1}[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // The caller's buffer was consumed even though the redacted length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting media relay bot v{}...", env!("CARGO_PKG_VERSION"));

    let settings = init_settings();

    run_bot(settings).await;

    Ok(())
}

fn debug_mode() -> bool {
    std::env::var("DEBUG_MODE")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let default_filter = if debug_mode() {
        DEBUG_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!(
                channel_id = s.channel_id,
                download_dir = %s.download_dir.display(),
                "Configuration loaded successfully."
            );
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_telegram_token_in_url() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let line = "POST https://api.telegram.org/bot123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsawz/sendVideo";
        let redacted = patterns.redact(line);
        assert!(!redacted.contains("AAHdqTcv"));
        assert!(redacted.contains("[TELEGRAM_TOKEN]"));
        Ok(())
    }

    #[test]
    fn test_redacts_rapidapi_key() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let redacted = patterns.redact(r#"headers: {"x-rapidapi-key": "abc123SECRET"} RAPID_API_KEY=abc123SECRET"#);
        assert!(!redacted.contains("abc123SECRET"));
        assert_eq!(redacted.matches("[MASKED]").count(), 2);
        Ok(())
    }
}
