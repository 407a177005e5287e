use std::time::Duration;

use resilient_fetch::{CancellationToken, FetchClient, RequestOptions, RetryOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/status/503".to_owned());

    let options = RetryOptions::from_env()
        .map_err(anyhow::Error::msg)?
        .with_max_retries(3);
    let client = FetchClient::new().with_options(options);

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let request = RequestOptions::get()
        .with_signal(token)
        .with_timeout(Duration::from_secs(5));

    match client.fetch(&url, &request).await {
        Ok(response) => println!("{} {}", response.status(), response.text().await?),
        Err(err) => println!("request failed: {err}"),
    }

    Ok(())
}
