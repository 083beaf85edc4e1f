use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{info, warn};

/// Poll `url` with GET requests until the inspector answers.
pub async fn wait_until_reachable(url: &str, attempts: u32, delay: Duration) -> Result<()> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;

    for attempt in 1..=attempts {
        match client.get(url).send().await {
            Ok(resp) => {
                info!("Viewer reachable at {} ({})", url, resp.status());
                return Ok(());
            }
            Err(e) => {
                warn!("Viewer not reachable yet (attempt {}/{}): {}", attempt, attempts, e);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    bail!("viewer at {} did not answer after {} attempts", url, attempts)
}
