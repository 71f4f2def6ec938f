use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use tracing::{debug, error};

use crate::config::ScraperConfig;

pub fn http_client(config: &ScraperConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.page_load_timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("failed to build http client")
}

pub fn fetch_html(client: &Client, url: &str, user_agent: &str) -> Result<String> {
    debug!(url, "fetching page");
    let resp = client
        .get(url)
        .header(USER_AGENT, user_agent)
        .send()
        .inspect_err(|err| error!(url, error = %err, "page request failed"))
        .with_context(|| format!("request {url}"))?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        let snippet = body.chars().take(200).collect::<String>();
        error!(url, %status, "page returned error status");
        return Err(anyhow!("http {status} for {url}: {snippet}"));
    }
    Ok(body)
}
