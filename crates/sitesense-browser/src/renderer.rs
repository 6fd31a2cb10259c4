//! Page rendering: one navigation producing the shared `PageArtifact`.

use crate::engine::BrowserEngine;
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, EventResponseReceived, ResourceType,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use sitesense_core::{ClickableElement, CookieInfo, NetworkRequest, PageArtifact, Viewport};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Script returning the geometry of every clickable element.
const CLICKABLE_ELEMENTS_JS: &str = r#"
(() => {
    const elements = Array.from(document.querySelectorAll('a, button, input, [onclick], [role="button"]'));
    return elements.map(el => {
        const rect = el.getBoundingClientRect();
        return {
            tag: el.tagName,
            text: el.innerText || '',
            href: typeof el.href === 'string' ? el.href : (el.getAttribute('href') || null),
            rect: { x: rect.x, y: rect.y, width: rect.width, height: rect.height }
        };
    });
})()
"#;

/// Produces the page snapshot every analyzer consumes.
///
/// Implementations must populate every artifact field or fail; a partial
/// artifact is never returned.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render `url` and capture its artifact.
    async fn render(&self, url: &str) -> Result<PageArtifact>;
}

#[async_trait]
impl PageRenderer for BrowserEngine {
    async fn render(&self, url: &str) -> Result<PageArtifact> {
        let session = self.launch().await?;
        let result = tokio::time::timeout(self.navigation_timeout(), async {
            let page = session.new_page().await?;
            self.capture(&page, url).await
        })
        .await;
        session.close().await;

        match result {
            Ok(artifact) => artifact,
            Err(_) => Err(BrowserError::Timeout(format!(
                "rendering {url} exceeded {:?}",
                self.navigation_timeout()
            ))),
        }
    }
}

impl BrowserEngine {
    async fn capture(&self, page: &Page, url: &str) -> Result<PageArtifact> {
        let network_log = Arc::new(Mutex::new(Vec::<NetworkRequest>::new()));
        let document_headers = Arc::new(Mutex::new(None::<HashMap<String, String>>));

        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let log = Arc::clone(&network_log);
        let request_task = tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let resource_type = event
                    .r#type
                    .as_ref()
                    .map_or_else(|| "other".to_string(), resource_type_name);
                if let Ok(mut log) = log.lock() {
                    log.push(NetworkRequest {
                        url: event.request.url.clone(),
                        method: event.request.method.clone(),
                        resource_type,
                    });
                }
            }
        });

        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let headers_slot = Arc::clone(&document_headers);
        let response_task = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if event.r#type != ResourceType::Document {
                    continue;
                }
                if let Ok(mut slot) = headers_slot.lock() {
                    if slot.is_none() {
                        *slot = Some(headers_to_map(event.response.headers.inner()));
                    }
                }
            }
        });

        let navigation = async {
            page.goto(url)
                .await
                .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;

            let screenshot = page
                .screenshot(
                    ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .build(),
                )
                .await?;
            let dom_html = page.content().await?;
            let cookies = page
                .get_cookies()
                .await?
                .into_iter()
                .map(|c| CookieInfo {
                    name: c.name,
                    secure: c.secure,
                    http_only: c.http_only,
                })
                .collect::<Vec<_>>();
            let clickable_elements: Vec<ClickableElement> = page
                .evaluate(CLICKABLE_ELEMENTS_JS)
                .await?
                .into_value()
                .map_err(|e| BrowserError::Evaluation(format!("clickable elements: {e}")))?;

            Ok::<_, BrowserError>((screenshot, dom_html, cookies, clickable_elements))
        }
        .await;

        request_task.abort();
        response_task.abort();

        let (screenshot, dom_html, cookies, clickable_elements) = navigation?;

        if screenshot.is_empty() {
            return Err(BrowserError::IncompleteArtifact(
                "screenshot is empty".to_string(),
            ));
        }

        let headers = document_headers
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| {
                BrowserError::IncompleteArtifact(format!("no document response for {url}"))
            })?;
        let network_log = network_log
            .lock()
            .map(|mut log| std::mem::take(&mut *log))
            .unwrap_or_default();

        tracing::info!(
            "Rendered {}: {} requests, {} clickable elements",
            url,
            network_log.len(),
            clickable_elements.len()
        );

        Ok(PageArtifact {
            screenshot,
            viewport: Viewport {
                width: self.config().window_width,
                height: self.config().window_height,
            },
            dom_html,
            headers,
            cookies,
            network_log,
            clickable_elements,
        })
    }
}

fn resource_type_name(resource_type: &ResourceType) -> String {
    format!("{resource_type:?}").to_lowercase()
}

/// Flatten the CDP header object into a string map.
fn headers_to_map(headers: &serde_json::Value) -> HashMap<String, String> {
    headers
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let value = v
                        .as_str()
                        .map_or_else(|| v.to_string(), ToString::to_string);
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}
