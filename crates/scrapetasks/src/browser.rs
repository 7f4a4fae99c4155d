//! Headless Chrome driver and the browser-bound task handlers.

use crate::{clean_selector, page_output};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use scrapecore::{BrowserSession, DriverError};
use scraperuntime::{StepContext, StepError, StepOutputs};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;

const ELEMENT_WAIT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A headless Chrome instance with a single page, owned by one execution's
/// environment for its whole lifetime.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    pub async fn launch() -> Result<Self, DriverError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .build()
            .map_err(DriverError::Launch)?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        // The CDP event loop must be polled for the browser to make
        // progress at all.
        let handler = tokio::spawn(async move { while events.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        Ok(Self {
            browser,
            page,
            handler,
        })
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        element
            .type_str(value)
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        Ok(())
    }

    async fn wait_for(
        &mut self,
        selector: &str,
        visible: bool,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let present = self.page.find_element(selector).await.is_ok();
            if present == visible {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::ElementNotFound(selector.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn scroll_to(&mut self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        element
            .scroll_into_view()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        self.page
            .content()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let result = self
            .browser
            .close()
            .await
            .map_err(|e| DriverError::Other(e.to_string()));
        self.handler.abort();
        result.map(|_| ())
    }
}

pub(crate) async fn launch_browser(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let url = step.require_input("Website Url")?.to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(StepError::Failed(format!("invalid URL: {url}")));
    }

    step.logs.info("Starting browser instance");
    let session = ChromeSession::launch().await?;
    step.env.replace_session(Box::new(session)).await;
    step.env.session_mut()?.navigate(&url).await?;
    step.logs.info(format!("Opened {url}"));
    Ok(page_output())
}

pub(crate) async fn navigate_url(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let url = step.require_input("Url")?.to_string();
    step.env.session_mut()?.navigate(&url).await?;
    step.logs.info(format!("Navigated to {url}"));
    Ok(page_output())
}

pub(crate) async fn page_to_html(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let html = step.env.session_mut()?.content().await?;
    step.logs.info(format!("Extracted {} characters of HTML", html.len()));

    let mut outputs = HashMap::from([("Html".to_string(), html)]);
    outputs.extend(page_output());
    Ok(outputs)
}

pub(crate) async fn fill_input(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let raw = step.require_input("Selector")?;
    let value = step.require_input("Value")?.to_string();
    let selector = adjusted_selector(&step, raw);

    step.env.session_mut()?.fill(&selector, &value).await?;
    step.logs.info(format!("Filled {selector}"));
    Ok(page_output())
}

pub(crate) async fn click_element(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let raw = step.require_input("Selector")?;
    let selector = adjusted_selector(&step, raw);

    let session = step.env.session_mut()?;
    session.wait_for(&selector, true, ELEMENT_WAIT).await?;
    session.click(&selector).await?;
    step.logs.info(format!("Clicked {selector}"));
    Ok(page_output())
}

pub(crate) async fn wait_for_element(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let raw = step.require_input("Selector")?;
    let visibility = step.require_input("Visibility")?;
    let visible = visibility != "hidden";
    let selector = adjusted_selector(&step, raw);

    step.env
        .session_mut()?
        .wait_for(&selector, visible, ELEMENT_WAIT)
        .await?;
    step.logs.info(format!(
        "Element {selector} became {}",
        if visible { "visible" } else { "hidden" }
    ));
    Ok(page_output())
}

pub(crate) async fn scroll_to_element(step: StepContext<'_>) -> Result<StepOutputs, StepError> {
    let raw = step.require_input("Selector")?;
    let selector = adjusted_selector(&step, raw);

    let session = step.env.session_mut()?;
    session.wait_for(&selector, true, ELEMENT_WAIT).await?;
    session.scroll_to(&selector).await?;
    step.logs.info(format!("Scrolled to {selector}"));
    Ok(page_output())
}

fn adjusted_selector(step: &StepContext<'_>, raw: &str) -> String {
    let selector = clean_selector(raw);
    if selector != raw {
        step.logs
            .info(format!("Adjusted selector \"{raw}\" to \"{selector}\""));
    }
    selector
}

#[cfg(test)]
mod tests {
    use crate::clean_selector;

    #[test]
    fn space_separated_classes_become_compound() {
        assert_eq!(clean_selector(".btn btn-primary"), ".btn.btn-primary");
    }

    #[test]
    fn plain_selectors_pass_through() {
        assert_eq!(clean_selector("#submit"), "#submit");
        assert_eq!(clean_selector("button[type=submit]"), "button[type=submit]");
    }
}
