//! Minimal WebDAV client over `reqwest`.

use bytes::Bytes;
use http::{Method, StatusCode};
use percent_encoding::percent_decode_str;
use url::Url;

use unifs_core::{Context, Error};

use crate::xml::{parse_multistatus, Resource, PROPFIND_BODY};
use crate::{WebDavConfig, WebDavError};

pub struct WebDavClient {
    config: WebDavConfig,
    client: reqwest::Client,
}

fn dav_method(name: &'static str) -> Result<Method, WebDavError> {
    Method::from_bytes(name.as_bytes()).map_err(|e| WebDavError::InvalidConfig {
        message: format!("method {}: {}", name, e),
    })
}

/// Decoded path of an `href`, which may be absolute or a bare path,
/// without its trailing slash.
pub fn href_path(href: &str) -> String {
    let path = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.to_string(),
    };
    percent_decode_str(&path)
        .decode_utf8_lossy()
        .trim_end_matches('/')
        .to_string()
}

impl WebDavClient {
    /// Build a client and check the server answers `OPTIONS` on the base
    /// collection, within the context's lifetime.
    pub async fn connect(ctx: &Context, config: WebDavConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(WebDavError::from)?;
        let this = Self { config, client };

        ctx.run(async {
            let url = this.config.base_url.clone();
            tracing::debug!(url = %url, "webdav handshake");
            let response = this
                .request(Method::OPTIONS, url.clone())
                .send()
                .await
                .map_err(WebDavError::from)?;
            expect(response, &Method::OPTIONS, &url, &[])?;
            Ok::<_, Error>(())
        })
        .await?;

        Ok(this)
    }

    pub fn config(&self) -> &WebDavConfig {
        &self.config
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        tracing::debug!(method = %method, url = %url, "webdav request");
        let builder = self.client.request(method, url);
        match &self.config.username {
            Some(username) => builder.basic_auth(username, Some(&self.config.password)),
            None => builder,
        }
    }

    /// PROPFIND with `Depth: 0` or `1`.
    pub async fn propfind(&self, url: &Url, depth: u8) -> Result<Vec<Resource>, WebDavError> {
        let method = dav_method("PROPFIND")?;
        let response = self
            .request(method.clone(), url.clone())
            .header("depth", depth.to_string())
            .header(http::header::CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(PROPFIND_BODY)
            .send()
            .await?;
        let response = expect(response, &method, url, &[StatusCode::MULTI_STATUS])?;
        parse_multistatus(&response.text().await?)
    }

    pub async fn get(&self, url: &Url) -> Result<Bytes, WebDavError> {
        let response = self.request(Method::GET, url.clone()).send().await?;
        let response = expect(response, &Method::GET, url, &[])?;
        Ok(response.bytes().await?)
    }

    pub async fn put(&self, url: &Url, data: Bytes) -> Result<(), WebDavError> {
        let response = self
            .request(Method::PUT, url.clone())
            .body(data)
            .send()
            .await?;
        expect(response, &Method::PUT, url, &[])?;
        Ok(())
    }

    /// MKCOL; `Ok(false)` when the collection already exists.
    pub async fn mkcol(&self, url: &Url) -> Result<bool, WebDavError> {
        let method = dav_method("MKCOL")?;
        let response = self.request(method.clone(), url.clone()).send().await?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            return Ok(false);
        }
        expect(response, &method, url, &[])?;
        Ok(true)
    }

    pub async fn delete(&self, url: &Url) -> Result<(), WebDavError> {
        let response = self.request(Method::DELETE, url.clone()).send().await?;
        expect(response, &Method::DELETE, url, &[])?;
        Ok(())
    }

    /// MOVE `from` to `to`, replacing whatever is there.
    pub async fn move_to(&self, from: &Url, to: &Url) -> Result<(), WebDavError> {
        let method = dav_method("MOVE")?;
        let response = self
            .request(method.clone(), from.clone())
            .header("destination", to.as_str())
            .header("overwrite", "T")
            .send()
            .await?;
        expect(response, &method, from, &[])?;
        Ok(())
    }
}

/// Accept any 2xx, or exactly `allowed` when given.
fn expect(
    response: reqwest::Response,
    method: &Method,
    url: &Url,
    allowed: &[StatusCode],
) -> Result<reqwest::Response, WebDavError> {
    let status = response.status();
    let ok = if allowed.is_empty() {
        status.is_success()
    } else {
        allowed.contains(&status)
    };
    if ok {
        Ok(response)
    } else {
        Err(WebDavError::Status {
            method: method.to_string(),
            path: url.path().to_string(),
            status: status.as_u16(),
        })
    }
}
