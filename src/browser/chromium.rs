use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::error::{BrowserError, BrowserResult};
use super::{BrowserSession, SessionCookie, WaitCondition};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// State of the first element matching a selector, as reported by the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
struct ElementProbe {
    present: bool,
    rendered: bool,
}

/// Which Chromium-family browser to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserChoice {
    /// Let the CDP driver locate an installed Chrome/Chromium.
    #[default]
    Auto,
    Chrome,
    Chromium,
    Edge,
}

impl BrowserChoice {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Chrome => "chrome",
            Self::Chromium => "chromium",
            Self::Edge => "edge",
        }
    }

    /// Executable looked up on `PATH`, or `None` for auto-detection.
    #[must_use]
    pub fn executable_name(self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            Self::Chrome => Some("google-chrome"),
            Self::Chromium => Some("chromium"),
            Self::Edge => Some("microsoft-edge"),
        }
    }
}

impl fmt::Display for BrowserChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowserChoice {
    type Err = BrowserError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "chrome" | "google-chrome" => Ok(Self::Chrome),
            "chromium" => Ok(Self::Chromium),
            "edge" | "msedge" => Ok(Self::Edge),
            other => Err(BrowserError::Configuration(format!(
                "unsupported browser: {other} (expected auto, chrome, chromium or edge)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub choice: BrowserChoice,
    /// Explicit executable; wins over `choice`.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Upper bound for a single CDP request (navigation included).
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            choice: BrowserChoice::Auto,
            executable: None,
            headless: true,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl LaunchOptions {
    fn to_config(&self) -> BrowserResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder().request_timeout(self.request_timeout);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        } else if let Some(name) = self.choice.executable_name() {
            builder = builder.chrome_executable(name);
        }
        builder = builder.args(vec![
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--password-store=basic".to_string(),
        ]);
        builder.build().map_err(BrowserError::Configuration)
    }
}

/// [`BrowserSession`] backed by one tab of a CDP-driven Chromium.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: Option<JoinHandle<()>>,
}

impl fmt::Debug for ChromiumSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromiumSession").finish_non_exhaustive()
    }
}

impl ChromiumSession {
    /// Launches the browser and opens the single tab used for the whole run.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Launch`] if the browser cannot be started.
    #[instrument(level = "debug")]
    pub async fn launch(options: &LaunchOptions) -> BrowserResult<Self> {
        let config = options.to_config()?;
        info!(
            browser = %options.choice,
            headless = options.headless,
            "Launching browser"
        );

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "browser handler reported error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        Ok(Self {
            browser,
            page,
            handler_task: Some(handler_task),
        })
    }

    /// Closes the browser and joins the CDP handler.
    pub async fn shutdown(mut self) -> BrowserResult<()> {
        info!("Shutting down browser");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            handle.await?;
        }
        Ok(())
    }

    async fn probe(&self, selector: &str) -> BrowserResult<ElementProbe> {
        let quoted = serde_json::to_string(selector)
            .map_err(|err| BrowserError::Unexpected(err.to_string()))?;
        let script = format!(
            "(() => {{ const el = document.querySelector({quoted}); \
             if (!el) return {{ present: false, rendered: false }}; \
             const style = window.getComputedStyle(el); \
             return {{ present: true, rendered: style.display !== 'none' \
             && style.visibility !== 'hidden' && el.getClientRects().length > 0 }}; }})()"
        );
        let result = self.page.evaluate(script).await?;
        result
            .into_value::<ElementProbe>()
            .map_err(|err| BrowserError::Unexpected(format!("element probe: {err}")))
    }

    async fn condition_holds(&self, condition: &WaitCondition) -> BrowserResult<bool> {
        let probe = self.probe(condition.selector()).await?;
        Ok(match condition {
            WaitCondition::Present(_) => probe.present,
            WaitCondition::Visible(_) => probe.rendered,
        })
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task
            && !handle.is_finished()
        {
            warn!("ChromiumSession dropped without explicit shutdown");
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        debug!(url = %url, "navigate");
        self.page
            .goto(url)
            .await
            .map_err(|err| BrowserError::navigation(url, err.to_string()))?;
        Ok(())
    }

    async fn back(&mut self) -> BrowserResult<()> {
        debug!("history back");
        self.page
            .evaluate("window.history.back()".to_string())
            .await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn wait_for(
        &mut self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> BrowserResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            // Evaluation can fail transiently while a navigation is committing.
            match self.condition_holds(condition).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(err) => debug!(error = %err, %condition, "condition check failed"),
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(condition.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn page_source(&mut self) -> BrowserResult<String> {
        Ok(self.page.content().await?)
    }

    async fn fill(&mut self, selector: &str, text: &str) -> BrowserResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn cookies(&mut self) -> BrowserResult<Vec<SessionCookie>> {
        let cookies = self.page.get_cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|cookie| {
                SessionCookie::new(
                    cookie.name,
                    cookie.value,
                    cookie.domain,
                    cookie.path,
                    cookie.secure,
                )
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_choice_parses_known_names() {
        assert_eq!("auto".parse::<BrowserChoice>().unwrap(), BrowserChoice::Auto);
        assert_eq!("Chrome".parse::<BrowserChoice>().unwrap(), BrowserChoice::Chrome);
        assert_eq!(
            " chromium ".parse::<BrowserChoice>().unwrap(),
            BrowserChoice::Chromium
        );
        assert_eq!("msedge".parse::<BrowserChoice>().unwrap(), BrowserChoice::Edge);
    }

    #[test]
    fn test_browser_choice_rejects_firefox() {
        let err = "firefox".parse::<BrowserChoice>().unwrap_err();
        assert!(err.to_string().contains("unsupported browser"));
    }

    #[test]
    fn test_browser_choice_round_trips_through_display() {
        for choice in [
            BrowserChoice::Auto,
            BrowserChoice::Chrome,
            BrowserChoice::Chromium,
            BrowserChoice::Edge,
        ] {
            assert_eq!(choice.to_string().parse::<BrowserChoice>().unwrap(), choice);
        }
    }

    #[test]
    fn test_element_probe_decodes_script_result() {
        let probe: ElementProbe =
            serde_json::from_str(r#"{"present":true,"rendered":false}"#).unwrap();
        assert_eq!(
            probe,
            ElementProbe {
                present: true,
                rendered: false
            }
        );
    }

    #[test]
    fn test_auto_choice_has_no_executable() {
        assert!(BrowserChoice::Auto.executable_name().is_none());
        assert_eq!(BrowserChoice::Edge.executable_name(), Some("microsoft-edge"));
    }
}
