#[cfg(feature = "chromium")]
pub mod chromium;
#[cfg(test)]
pub mod scripted;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::RenderError;
use crate::extract::RawEntity;
use crate::registry::Category;

/// The page context that materializes entities. Every method takes `&mut self`:
/// the context is shared state and is driven from one flow only.
#[async_trait]
pub trait RenderHost: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    async fn select_category(&mut self, category: Category) -> Result<(), RenderError>;

    /// Resolves once the category's dataset is non-empty, or fails with `Timeout`.
    async fn wait_data_ready(
        &mut self,
        category: Category,
        timeout: Duration,
    ) -> Result<(), RenderError>;

    async fn sort_by_id(&mut self, category: Category) -> Result<(), RenderError>;

    async fn count(&mut self, category: Category) -> Result<usize, RenderError>;

    /// Render entity `index` and return its `fields`. Bounded by `timeout`.
    async fn render_entity(
        &mut self,
        category: Category,
        index: usize,
        fields: &[String],
        timeout: Duration,
    ) -> Result<RawEntity, RenderError>;

    /// Capture the currently rendered entity as a PNG at `path`.
    async fn snapshot(&mut self, category: Category, path: &Path) -> Result<(), RenderError>;
}

/// Re-run `probe` every `interval` until it reports true. Probe errors end the wait
/// immediately; running out of time (including inside a hung probe) yields
/// `RenderError::Timeout`.
pub async fn poll_until<F, Fut>(
    op: &'static str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<(), RenderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, RenderError>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, probe()).await {
            Ok(Ok(true)) => return Ok(()),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(RenderError::Timeout { op, after: timeout }),
        }
        if Instant::now() >= deadline {
            return Err(RenderError::Timeout { op, after: timeout });
        }
        tokio::time::sleep(interval).await;
    }
}
