use reqwest::{Client, Proxy};
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 20;
const MAX_REDIRECTS: usize = 10;

pub const USER_AGENT: &str = concat!("feedpush/", env!("CARGO_PKG_VERSION"));

/// Shared client for feeds, Telegram and the push endpoint. An unusable proxy
/// URL is logged and the client connects directly.
pub fn build_client(proxy_url: Option<&str>, timeout: Duration) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(USER_AGENT);

    if let Some(url) = proxy_url.filter(|u| !u.trim().is_empty()) {
        match Proxy::all(url) {
            Ok(proxy) => {
                tracing::info!(proxy = url, "using HTTP proxy");
                builder = builder.proxy(proxy);
            }
            Err(e) => tracing::error!(proxy = url, error = %e, "invalid proxy URL, connecting directly"),
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_and_without_proxy() {
        assert!(build_client(None, Duration::from_secs(60)).is_ok());
        assert!(build_client(Some("http://127.0.0.1:8888"), Duration::from_secs(5)).is_ok());
        assert!(build_client(Some("   "), Duration::from_secs(5)).is_ok());
    }
}
