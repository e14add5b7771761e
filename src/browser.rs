use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::Config;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One browser process with a single page reused across all items.
pub struct Session {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl Session {
    pub async fn launch(cfg: &Config) -> Result<Self> {
        let (width, height) = cfg.viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage");
        if !cfg.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(|e| anyhow!(e))?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        Ok(Self { browser, page, handler })
    }

    /// Navigate and wait for the load to settle, bounded by `timeout`.
    pub async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| anyhow!("navigation to {url} timed out"))?
            .with_context(|| format!("navigation to {url} failed"))?;
        Ok(())
    }

    /// Navigate and treat the appearance of `ready_selector` as the
    /// load-success signal.
    pub async fn goto_and_wait(&self, url: &str, ready_selector: &str, cfg: &Config) -> Result<()> {
        self.goto(url, cfg.nav_timeout).await?;
        self.wait_for(ready_selector, cfg.wait_timeout).await
    }

    /// Retry `goto_and_wait` up to the configured attempt count with a fixed
    /// backoff between attempts.
    pub async fn navigate_with_retry(
        &self,
        url: &str,
        ready_selector: &str,
        cfg: &Config,
    ) -> Result<()> {
        with_retries(cfg.retry_attempts, cfg.retry_backoff, |attempt| async move {
            if attempt > 1 {
                debug!("Retry {}/{} for {}", attempt, cfg.retry_attempts, url);
            }
            self.goto_and_wait(url, ready_selector, cfg).await
        })
        .await
    }

    /// Poll for a selector until it appears or `timeout` elapses.
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("timed out waiting for `{selector}`");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Inner HTML of the first node matching `selector`, or `None` when the
    /// node is absent.
    pub async fn inner_html(&self, selector: &str) -> Result<Option<String>> {
        let js = format!("document.querySelector({selector:?})?.innerHTML ?? null");
        let result = self.page.evaluate(js).await?;
        optional_string(result.value())
    }

    /// Visible text of the first node matching `selector`.
    pub async fn text_of(&self, selector: &str) -> Result<Option<String>> {
        let js = format!("document.querySelector({selector:?})?.innerText ?? null");
        let result = self.page.evaluate(js).await?;
        optional_string(result.value())
    }

    /// Raw `document.title`.
    pub async fn document_title(&self) -> Result<String> {
        let value = self.page.evaluate("document.title").await?;
        Ok(value.into_value::<String>()?)
    }

    /// Click via the DOM, which goes through even when an overlay intercepts
    /// pointer events. Errors when the element is absent.
    pub async fn force_click(&self, selector: &str) -> Result<()> {
        let js = format!(
            "(() => {{ const el = document.querySelector({selector:?}); \
             if (!el) return false; el.click(); return true; }})()"
        );
        let value = self.page.evaluate(js).await?;
        if !value.into_value::<bool>()? {
            bail!("no element matching `{selector}` to click");
        }
        Ok(())
    }

    /// Full scrollable height of the current document body.
    pub async fn content_height(&self) -> Result<u32> {
        let value = self.page.evaluate("document.body.scrollHeight").await?;
        Ok(value.into_value::<u32>()?)
    }

    /// Resize the virtual viewport so a capture is not clipped vertically.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| anyhow!(e))?;
        self.page.execute(params).await?;
        Ok(())
    }

    pub async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        Ok(self.page.screenshot(params).await?)
    }

    pub async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("no element matching `{selector}` to capture"))?;
        Ok(element.screenshot(CaptureScreenshotFormat::Png).await?)
    }

    /// Close any modal opened by the preview, then wait for the page to go
    /// quiet. Best-effort: every failure is swallowed.
    pub async fn dismiss_overlay(&self, close_selector: &str) {
        if let Err(e) = self.force_click(close_selector).await {
            debug!("No overlay to dismiss: {e}");
            return;
        }
        match tokio::time::timeout(Duration::from_secs(5), self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("Quiescence wait failed after dismissing overlay: {e}"),
            Err(_) => debug!("Quiescence wait timed out after dismissing overlay"),
        }
    }

    /// Full HTML of the current page.
    pub async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    pub async fn close(self) -> Result<()> {
        let Session { mut browser, page, handler } = self;
        if let Err(e) = page.close().await {
            warn!("Failed to close page: {e}");
        }
        browser.close().await?;
        let _ = browser.wait().await;
        handler.abort();
        Ok(())
    }
}

/// Map an evaluation result to an optional string. Chrome reports an absent
/// node as a JS `null` (`RemoteObject.value` missing or `Null`), which must
/// read as `None` rather than a deserialization error.
fn optional_string(value: Option<&serde_json::Value>) -> Result<Option<String>> {
    match value {
        Some(v) if !v.is_null() => Ok(Some(serde_json::from_value(v.clone())?)),
        _ => Ok(None),
    }
}

/// Run `op` up to `attempts` times, sleeping `backoff` between failures.
/// Returns the first success or the last error once attempts are exhausted.
pub async fn with_retries<T, F, Fut>(attempts: u32, backoff: Duration, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("Attempt {}/{} failed: {e:#}", attempt, attempts);
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("no attempts were made")))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn absent_or_null_dom_value_reads_as_none() {
        assert_eq!(optional_string(None).unwrap(), None);
        assert_eq!(optional_string(Some(&serde_json::Value::Null)).unwrap(), None);
    }

    #[test]
    fn string_dom_value_reads_as_some() {
        let value = serde_json::json!("<p>body</p>");
        assert_eq!(
            optional_string(Some(&value)).unwrap().as_deref(),
            Some("<p>body</p>")
        );
    }

    #[tokio::test]
    async fn retry_succeeds_on_final_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = with_retries(3, Duration::from_millis(1), move |_| {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    bail!("transient failure {n}");
                }
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_reports_failure_after_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result: Result<()> = with_retries(3, Duration::from_millis(1), move |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                bail!("always fails")
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_stops_after_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = with_retries(5, Duration::from_millis(1), move |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
