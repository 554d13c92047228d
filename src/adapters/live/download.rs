//! Live adapter that downloads a generated image.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ORIGIN, REFERER, USER_AGENT};
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::error::BotError;
use crate::http::HttpSession;
use crate::ports::image_fetcher::{FetchFuture, FetchedImage, ImageFetcher};

/// Total time allowed for one download, redirects included.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

// Some object stores refuse requests that don't look like a browser.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const PROVIDER_REFERER: &str = "https://www.volcengine.com/";
const PROVIDER_ORIGIN: &str = "https://www.volcengine.com";

/// Downloads image URLs through the shared HTTP session.
pub struct HttpFetcher {
    session: Arc<HttpSession>,
}

impl HttpFetcher {
    /// Create a fetcher backed by the given session.
    #[must_use]
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> FetchFuture<'_> {
        let url = url.to_string();
        Box::pin(async move {
            let url = normalize_url(&url)?;
            let client = self.session.client()?;
            debug!(%url, "downloading image");

            let response = client
                .get(url.clone())
                .header(USER_AGENT, BROWSER_USER_AGENT)
                .header(REFERER, PROVIDER_REFERER)
                .header(ORIGIN, PROVIDER_ORIGIN)
                .timeout(DOWNLOAD_TIMEOUT)
                .send()
                .await
                .map_err(|e| download_error(&e))?;

            let status = response.status();
            if status != StatusCode::OK {
                return Err(BotError::Download(format!("HTTP {} for {url}", status.as_u16())));
            }

            let data = response.bytes().await.map_err(|e| download_error(&e))?;
            if data.is_empty() {
                return Err(BotError::Download(format!("empty body from {url}")));
            }
            Ok(FetchedImage { data: data.to_vec() })
        })
    }
}

fn download_error(e: &reqwest::Error) -> BotError {
    if e.is_timeout() {
        BotError::Download(format!("timed out after {}s", DOWNLOAD_TIMEOUT.as_secs()))
    } else {
        BotError::Download(e.to_string())
    }
}

/// Validate a result URL and clean up partially-encoded paths.
///
/// Each path segment is percent-decoded and re-encoded so that raw spaces or
/// unicode and already-escaped sequences both end up escaped exactly once.
/// The query string is left alone: signed URLs break if it is re-encoded.
///
/// # Errors
///
/// Returns [`BotError::Download`] for empty, non-HTTP or unparseable URLs.
pub fn normalize_url(raw: &str) -> Result<Url, BotError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(BotError::Download("image URL is empty".into()));
    }
    let lower = raw.to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return Err(BotError::Download(format!("not an http(s) URL: {raw}")));
    }

    let mut url =
        Url::parse(raw).map_err(|e| BotError::Download(format!("invalid URL {raw}: {e}")))?;

    let path = url
        .path()
        .split('/')
        .map(|segment| match urlencoding::decode(segment) {
            Ok(decoded) => urlencoding::encode(&decoded).into_owned(),
            Err(_) => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/");
    url.set_path(&path);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live::test_server::{serve, Canned};

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Arc::new(HttpSession::new(false)))
    }

    #[test]
    fn rejects_empty_and_non_http_urls() {
        for raw in ["", "   ", "ftp://x/1.jpg", "x/1.jpg", "file:///etc/passwd"] {
            assert!(matches!(normalize_url(raw), Err(BotError::Download(_))), "{raw:?}");
        }
    }

    #[test]
    fn encodes_raw_spaces_in_path() {
        let url = normalize_url("https://cdn.example/out/my image.jpg").unwrap();
        assert_eq!(url.path(), "/out/my%20image.jpg");
    }

    #[test]
    fn does_not_double_encode() {
        let url = normalize_url("https://cdn.example/out/a%20b c.jpg").unwrap();
        assert_eq!(url.path(), "/out/a%20b%20c.jpg");
    }

    #[test]
    fn keeps_signed_query_intact() {
        let raw = "https://cdn.example/1.jpg?X-Tos-Signature=ab%2Fcd%3D&X-Tos-Expires=86400";
        let url = normalize_url(raw).unwrap();
        assert_eq!(url.query(), Some("X-Tos-Signature=ab%2Fcd%3D&X-Tos-Expires=86400"));
    }

    #[tokio::test]
    async fn downloads_body_with_browser_headers() {
        let server = serve(vec![("/img/1.jpg", Canned::bytes(200, JPEG))]).await;

        let image = fetcher().fetch(&format!("{}/img/1.jpg", server.base)).await.unwrap();
        assert_eq!(image.data, JPEG);

        let sent = &server.requests()[0];
        assert_eq!(sent.method, "GET");
        assert!(sent.header("user-agent").unwrap().starts_with("Mozilla/5.0"));
        assert_eq!(sent.header("referer"), Some(PROVIDER_REFERER));
    }

    #[tokio::test]
    async fn follows_redirects() {
        let server = serve(vec![
            ("/short", Canned::redirect("/final.jpg")),
            ("/final.jpg", Canned::bytes(200, JPEG)),
        ])
        .await;

        let image = fetcher().fetch(&format!("{}/short", server.base)).await.unwrap();
        assert_eq!(image.data, JPEG);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn non_200_is_download_error() {
        let server = serve(Vec::new()).await;
        let err = fetcher().fetch(&format!("{}/missing.jpg", server.base)).await.unwrap_err();
        match err {
            BotError::Download(msg) => assert!(msg.contains("404"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn requests_partially_encoded_path_once_encoded() {
        let server = serve(vec![("/a%20b%20c.jpg", Canned::bytes(200, JPEG))]).await;
        let image = fetcher().fetch(&format!("{}/a%20b c.jpg", server.base)).await.unwrap();
        assert_eq!(image.data, JPEG);
    }
}
