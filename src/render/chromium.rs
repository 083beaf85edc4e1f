use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{poll_until, RenderHost};
use crate::error::RenderError;
use crate::extract::RawEntity;
use crate::registry::Category;
use crate::value::Value;

pub struct ChromiumOptions {
    pub headless: bool,
    pub width: u32,
    pub height: u32,
    pub poll_interval: Duration,
}

/// Headless Chromium driving the inspector page over CDP.
pub struct ChromiumHost {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    poll_interval: Duration,
}

impl ChromiumHost {
    pub async fn launch(opts: &ChromiumOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .window_size(opts.width, opts.height);
        if !opts.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(|e| anyhow!("browser config: {}", e))?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("could not launch browser: {}", e))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!("cdp handler: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("could not create page: {}", e))?;
        info!("Browser launched ({}x{})", opts.width, opts.height);

        Ok(ChromiumHost {
            browser,
            page,
            handler,
            poll_interval: opts.poll_interval,
        })
    }

    pub async fn close(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        self.handler.abort();
        closed.map_err(|e| anyhow!("could not close browser: {}", e))?;
        Ok(())
    }

    fn page(&self) -> Result<&Page, RenderError> {
        if self.handler.is_finished() {
            return Err(RenderError::Closed("browser connection ended".into()));
        }
        Ok(&self.page)
    }
}

fn script_error(e: CdpError) -> RenderError {
    RenderError::Script(e.to_string())
}

async fn eval<T: DeserializeOwned>(page: &Page, script: String) -> Result<T, RenderError> {
    let params = EvaluateParams::builder()
        .expression(script)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(RenderError::Script)?;
    let result = page.evaluate_expression(params).await.map_err(script_error)?;
    result.into_value::<T>().map_err(|e| RenderError::Parse(e.to_string()))
}

fn dataset(category: Category) -> String {
    format!("DMI.modctx['{}data']", category)
}

fn overlay_selector(category: Category) -> String {
    format!("#{}-page div.fixed-overlay", category)
}

fn ready_script(category: Category) -> String {
    format!(
        "(() => {{ const d = window.DMI && DMI.modctx && {ds}; return !!(d && d.length > 0); }})()",
        ds = dataset(category)
    )
}

fn render_script(category: Category, index: usize) -> String {
    format!(
        r#"((i) => {{
    const e = {ds}[i];
    const overlay = document.querySelector('{sel}');
    if (!e || !overlay) throw new Error('nothing to render at index ' + i);
    const rendered = e.renderOverlay(e);
    if (rendered instanceof Node) {{ overlay.innerHTML = ''; overlay.appendChild(rendered); }}
    else {{ overlay.innerHTML = String(rendered || ''); }}
    return overlay.innerHTML.trim().length > 0;
}})({index})"#,
        ds = dataset(category),
        sel = overlay_selector(category),
        index = index
    )
}

fn fields_script(category: Category, index: usize, fields_json: &str) -> String {
    format!(
        r#"((i, fields) => {{
    const e = {ds}[i];
    const data = {{}};
    fields.forEach(f => {{ data[f] = e[f] === undefined ? null : e[f]; }});
    return JSON.stringify(data);
}})({index}, {fields})"#,
        ds = dataset(category),
        index = index,
        fields = fields_json
    )
}

#[async_trait]
impl RenderHost for ChromiumHost {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.page()?.goto(url).await.map_err(script_error)?;
        Ok(())
    }

    async fn select_category(&mut self, category: Category) -> Result<(), RenderError> {
        let button = self
            .page()?
            .find_element(format!("#{}-page-button", category))
            .await
            .map_err(script_error)?;
        button.click().await.map_err(script_error)?;
        Ok(())
    }

    async fn wait_data_ready(
        &mut self,
        category: Category,
        timeout: Duration,
    ) -> Result<(), RenderError> {
        let page = self.page()?;
        let script = ready_script(category);
        poll_until("wait-data-ready", timeout, self.poll_interval, || {
            eval::<bool>(page, script.clone())
        })
        .await
    }

    async fn sort_by_id(&mut self, category: Category) -> Result<(), RenderError> {
        let script = format!(
            "(() => {{ {}.sort((a, b) => a.id - b.id); return true; }})()",
            dataset(category)
        );
        eval::<bool>(self.page()?, script).await.map(|_| ())
    }

    async fn count(&mut self, category: Category) -> Result<usize, RenderError> {
        eval::<usize>(self.page()?, format!("{}.length", dataset(category))).await
    }

    async fn render_entity(
        &mut self,
        category: Category,
        index: usize,
        fields: &[String],
        timeout: Duration,
    ) -> Result<RawEntity, RenderError> {
        let page = self.page()?;
        let script = render_script(category, index);
        poll_until("render", timeout, self.poll_interval, || {
            eval::<bool>(page, script.clone())
        })
        .await?;

        let fields_json =
            serde_json::to_string(fields).map_err(|e| RenderError::Parse(e.to_string()))?;
        let json: String = eval(page, fields_script(category, index, &fields_json)).await?;
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&json).map_err(|e| RenderError::Parse(e.to_string()))?;
        Ok(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
    }

    async fn snapshot(&mut self, category: Category, path: &Path) -> Result<(), RenderError> {
        let overlay = self
            .page()?
            .find_element(overlay_selector(category))
            .await
            .map_err(script_error)?;
        let png = overlay
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(script_error)?;
        tokio::fs::write(path, png)
            .await
            .map_err(|e| RenderError::Script(format!("{}: {}", path.display(), e)))
    }
}
