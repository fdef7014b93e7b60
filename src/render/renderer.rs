//! Headless browser rendering for client-rendered listing pages
//!
//! Uses Chrome DevTools Protocol via chromiumoxide. Each scraper run launches
//! one isolated (incognito) browser lazily and must release it with
//! [`PageRenderer::close`].

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Rendered page result
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Final URL after any redirects
    pub url: String,
    /// Fully rendered HTML content
    pub html: String,
    /// Time taken to render (milliseconds)
    pub render_time_ms: u64,
}

/// Source of rendered page HTML
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Load a page, let it settle and return the rendered DOM
    async fn render(&self, url: &str) -> Result<RenderedPage>;

    /// Release every browser resource. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

/// Settings for the headless browser session
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub page_load_timeout_ms: u64,
    /// Wait after navigation so client-side requests can finish
    pub settle_wait_ms: u64,
    pub user_agent: String,
    /// Disable sandbox (Docker/CI environments)
    pub no_sandbox: bool,
}

impl From<&RenderConfig> for RendererConfig {
    fn from(config: &RenderConfig) -> Self {
        Self {
            page_load_timeout_ms: config.page_load_timeout_ms,
            settle_wait_ms: config.settle_wait_ms,
            user_agent: config.user_agent.clone(),
            no_sandbox: config.no_sandbox,
        }
    }
}

#[cfg(feature = "js-rendering")]
mod browser_impl {
    use super::*;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tokio::time::{timeout, Instant};
    use tracing::{debug, info, warn};

    /// Headless Chrome renderer
    pub struct HeadlessRenderer {
        config: RendererConfig,
        browser: Mutex<Option<Browser>>,
        handler_handle: Mutex<Option<JoinHandle<()>>>,
    }

    impl HeadlessRenderer {
        pub fn new(config: RendererConfig) -> Self {
            Self {
                config,
                browser: Mutex::new(None),
                handler_handle: Mutex::new(None),
            }
        }

        async fn ensure_browser(&self) -> Result<()> {
            let mut browser_guard = self.browser.lock().await;
            if browser_guard.is_some() {
                return Ok(());
            }

            info!("Launching headless browser");

            let mut builder = BrowserConfig::builder();
            if self.config.no_sandbox {
                builder = builder.no_sandbox();
            }
            builder = builder
                .arg("--incognito")
                .arg(format!("--user-agent={}", self.config.user_agent))
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--disable-extensions")
                .arg("--window-size=1366,900");

            let browser_config = builder
                .build()
                .map_err(|e| Error::Render(format!("Failed to build browser config: {}", e)))?;

            let (browser, mut handler) = Browser::launch(browser_config)
                .await
                .map_err(|e| Error::Render(format!("Failed to launch browser: {}", e)))?;

            let handle = tokio::spawn(async move {
                while let Some(result) = handler.next().await {
                    if result.is_err() {
                        break;
                    }
                }
            });

            *browser_guard = Some(browser);
            *self.handler_handle.lock().await = Some(handle);
            Ok(())
        }
    }

    #[async_trait]
    impl PageRenderer for HeadlessRenderer {
        async fn render(&self, url: &str) -> Result<RenderedPage> {
            self.ensure_browser().await?;

            let start = Instant::now();
            debug!("Rendering: {}", url);

            let browser_guard = self.browser.lock().await;
            let browser = browser_guard
                .as_ref()
                .ok_or_else(|| Error::Render("Browser not initialized".to_string()))?;

            let page = browser
                .new_page(url)
                .await
                .map_err(|e| Error::Render(format!("Failed to open {}: {}", url, e)))?;

            let load_timeout = Duration::from_millis(self.config.page_load_timeout_ms);
            let loaded = match timeout(load_timeout, page.wait_for_navigation()).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(Error::Render(format!("Navigation failed for {}: {}", url, e))),
                Err(_) => Err(Error::Timeout(format!("Page load {}", url))),
            };

            let rendered = match loaded {
                Ok(()) => {
                    if self.config.settle_wait_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.config.settle_wait_ms))
                            .await;
                    }

                    let final_url = page
                        .url()
                        .await
                        .ok()
                        .flatten()
                        .unwrap_or_else(|| url.to_string());

                    page.content()
                        .await
                        .map(|html| RenderedPage {
                            url: final_url,
                            html,
                            render_time_ms: start.elapsed().as_millis() as u64,
                        })
                        .map_err(|e| Error::Render(format!("Failed to read DOM of {}: {}", url, e)))
                }
                Err(e) => Err(e),
            };

            // the tab is closed whether or not rendering succeeded
            if let Err(e) = page.close().await {
                warn!("Failed to close tab: {}", e);
            }

            if let Ok(page) = &rendered {
                debug!("Rendered {} in {}ms", url, page.render_time_ms);
            }
            rendered
        }

        async fn close(&self) -> Result<()> {
            let mut browser_guard = self.browser.lock().await;
            let closed = match browser_guard.take() {
                Some(mut browser) => {
                    let result = browser
                        .close()
                        .await
                        .map(|_| ())
                        .map_err(|e| Error::Render(format!("Failed to close browser: {}", e)));
                    let _ = browser.wait().await;
                    result
                }
                None => Ok(()),
            };

            if let Some(handle) = self.handler_handle.lock().await.take() {
                handle.abort();
            }
            closed
        }
    }
}

#[cfg(feature = "js-rendering")]
pub use browser_impl::HeadlessRenderer;

/// Stub renderer when the js-rendering feature is disabled
#[cfg(not(feature = "js-rendering"))]
pub struct HeadlessRenderer {
    _config: RendererConfig,
}

#[cfg(not(feature = "js-rendering"))]
impl HeadlessRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { _config: config }
    }
}

#[cfg(not(feature = "js-rendering"))]
#[async_trait]
impl PageRenderer for HeadlessRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        Err(Error::Render(format!(
            "Headless rendering not available for {}. \
             Compile with --features js-rendering to enable it.",
            url
        )))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Check if the headless browser is compiled in
pub fn is_js_rendering_available() -> bool {
    cfg!(feature = "js-rendering")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_config_from_render_config() {
        let render = RenderConfig {
            no_sandbox: true,
            ..Default::default()
        };
        let config = RendererConfig::from(&render);
        assert!(config.no_sandbox);
        assert_eq!(config.settle_wait_ms, render.settle_wait_ms);
        assert!(config.user_agent.contains("Mozilla"));
    }

    #[cfg(not(feature = "js-rendering"))]
    #[tokio::test]
    async fn test_stub_renderer_reports_unavailable() {
        let renderer = HeadlessRenderer::new(RendererConfig::from(&RenderConfig::default()));
        let err = renderer.render("https://example.com").await.unwrap_err();
        assert!(matches!(err, Error::Render(_)));
        assert!(renderer.close().await.is_ok());
    }
}
