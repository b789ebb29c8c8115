//! [`FileSystem`] over the S3 REST API, path-style addressing.

use std::any::Any;
use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{Method, StatusCode};
use url::Url;

use unifs_core::path::{clean, join};
use unifs_core::{sort_entries, Context, DirEntry, Error, FileSystem, Metadata};

use crate::sign::{amz_date, canonical_query, sha256_hex, uri_encode, CanonicalRequest, Signer};
use crate::xml::{parse_error, parse_list, ListResult};
use crate::{S3Config, S3Error};

/// Page size requested from ListObjectsV2.
const LIST_PAGE_SIZE: &str = "1000";

pub struct S3FileSystem {
    config: S3Config,
    client: reqwest::Client,
}

/// One signed request.
struct S3Request<'a> {
    method: Method,
    key: &'a str,
    query: Vec<(&'static str, String)>,
    headers: BTreeMap<String, String>,
    body: Bytes,
}

impl<'a> S3Request<'a> {
    fn new(method: Method, key: &'a str) -> Self {
        Self {
            method,
            key,
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }
}

impl S3FileSystem {
    /// Build a file system for `config`. No request is sent.
    pub fn new(config: S3Config) -> Result<Self, S3Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Cleaned relative path and the object key it maps to.
    fn key(&self, path: &str) -> Result<(String, String), Error> {
        let cleaned = clean(path)?;
        let key = join(&self.config.prefix, &cleaned);
        Ok((cleaned, key))
    }

    fn object_uri(&self, key: &str) -> String {
        if key.is_empty() {
            format!("/{}", uri_encode(&self.config.bucket, false))
        } else {
            format!(
                "/{}/{}",
                uri_encode(&self.config.bucket, false),
                uri_encode(key, false)
            )
        }
    }

    async fn send(&self, request: S3Request<'_>) -> Result<reqwest::Response, S3Error> {
        let uri = self.object_uri(request.key);
        let query = canonical_query(&request.query);

        let now = Utc::now();
        let payload_hash = sha256_hex(&request.body);
        let mut headers = request.headers;
        headers.insert("host".to_string(), self.config.host_header());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        headers.insert("x-amz-date".to_string(), amz_date(now));

        let signer = Signer {
            access_key_id: &self.config.access_key_id,
            secret_access_key: &self.config.secret_access_key,
            region: &self.config.region,
        };
        let authorization = signer.authorization(
            &CanonicalRequest {
                method: request.method.as_str(),
                uri: &uri,
                query: &query,
                headers: &headers,
                payload_hash: &payload_hash,
            },
            now,
        );

        let url = self.request_url(&uri, &query);
        tracing::debug!(method = %request.method, key = request.key, "s3 request");

        let mut builder = self
            .client
            .request(request.method, url)
            .header("authorization", authorization);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        Ok(builder.body(request.body).send().await?)
    }

    fn request_url(&self, uri: &str, query: &str) -> Url {
        let mut url = self.config.endpoint_url.clone();
        url.set_path(uri);
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        url
    }

    async fn list_page(
        &self,
        prefix: &str,
        delimiter: bool,
        max_keys: &str,
        token: Option<&str>,
    ) -> Result<ListResult, Error> {
        let mut request = S3Request::new(Method::GET, "")
            .query("list-type", "2")
            .query("prefix", prefix)
            .query("max-keys", max_keys);
        if delimiter {
            request = request.query("delimiter", "/");
        }
        if let Some(token) = token {
            request = request.query("continuation-token", token);
        }

        let response = success(self.send(request).await?, prefix).await?;
        let body = response.text().await.map_err(S3Error::from)?;
        Ok(parse_list(&body)?)
    }

    /// Every object key under `prefix`, following continuation tokens.
    async fn keys_under(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .list_page(prefix, false, LIST_PAGE_SIZE, token.as_deref())
                .await?;
            keys.extend(page.contents.into_iter().map(|c| c.key));
            match page.next_continuation_token {
                Some(next) if page.is_truncated => token = Some(next),
                _ => return Ok(keys),
            }
        }
    }

    async fn is_directory(&self, key: &str) -> Result<bool, Error> {
        let page = self
            .list_page(&format!("{}/", key), true, "1", None)
            .await?;
        Ok(!page.contents.is_empty() || !page.common_prefixes.is_empty())
    }

    async fn stat_key(&self, cleaned: &str, key: &str) -> Result<Metadata, Error> {
        if cleaned.is_empty() {
            return Ok(Metadata::directory(None));
        }

        let response = self.send(S3Request::new(Method::HEAD, key)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            if self.is_directory(key).await? {
                return Ok(Metadata::directory(None));
            }
            return Err(Error::NotFound {
                path: cleaned.to_string(),
            });
        }

        let response = success(response, cleaned).await?;
        let headers = response.headers();
        // The body of a HEAD response is empty, so read the header itself.
        let size = headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let modified = headers
            .get(http::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|t| t.with_timezone(&Utc));
        Ok(Metadata::file(size, modified))
    }

    async fn copy_object(&self, from_key: &str, to_key: &str) -> Result<(), Error> {
        let source = format!(
            "/{}/{}",
            uri_encode(&self.config.bucket, false),
            uri_encode(from_key, false)
        );
        let request = S3Request::new(Method::PUT, to_key).header("x-amz-copy-source", source);
        success(self.send(request).await?, from_key).await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), Error> {
        success(self.send(S3Request::new(Method::DELETE, key)).await?, key).await?;
        Ok(())
    }
}

/// Pass successful responses through; turn the rest into errors.
///
/// A 404 without a code, or with `NoSuchKey`, is [`Error::NotFound`].
async fn success(response: reqwest::Response, path: &str) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = parse_error(&body);
    if status == StatusCode::NOT_FOUND && (code.is_empty() || code == "NoSuchKey") {
        return Err(Error::NotFound {
            path: path.to_string(),
        });
    }
    Err(S3Error::Status {
        status: status.as_u16(),
        code,
        message,
    }
    .into())
}

fn strip_prefix<'k>(key: &'k str, prefix: &str) -> &'k str {
    key.strip_prefix(prefix).unwrap_or(key)
}

#[async_trait]
impl FileSystem for S3FileSystem {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn stat(&self, ctx: &Context, path: &str) -> Result<Metadata, Error> {
        let (cleaned, key) = self.key(path)?;
        ctx.run(self.stat_key(&cleaned, &key)).await
    }

    async fn read(&self, ctx: &Context, path: &str) -> Result<Bytes, Error> {
        let (cleaned, key) = self.key(path)?;
        ctx.run(async {
            let response = self.send(S3Request::new(Method::GET, &key)).await?;
            let response = success(response, &cleaned).await?;
            let data = response.bytes().await.map_err(S3Error::from)?;
            Ok::<_, Error>(data)
        })
        .await
    }

    async fn write(&self, ctx: &Context, path: &str, data: Bytes) -> Result<(), Error> {
        let (cleaned, key) = self.key(path)?;
        if cleaned.is_empty() {
            return Err(Error::InvalidPath {
                message: "cannot write to the backend root".to_string(),
            });
        }
        ctx.run(async {
            let request = S3Request::new(Method::PUT, &key).body(data);
            success(self.send(request).await?, &cleaned).await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn list(&self, ctx: &Context, path: &str) -> Result<Vec<DirEntry>, Error> {
        let (cleaned, key) = self.key(path)?;
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key)
        };

        ctx.run(async {
            let mut entries = Vec::new();
            let mut seen = false;
            let mut token: Option<String> = None;
            loop {
                let page = self
                    .list_page(&prefix, true, LIST_PAGE_SIZE, token.as_deref())
                    .await?;
                seen |= !page.contents.is_empty() || !page.common_prefixes.is_empty();

                for object in page.contents {
                    let name = strip_prefix(&object.key, &prefix);
                    // Directory marker of the listed directory itself.
                    if name.is_empty() {
                        continue;
                    }
                    entries.push(DirEntry {
                        name: name.to_string(),
                        metadata: Metadata::file(object.size, object.last_modified),
                    });
                }
                for common in page.common_prefixes {
                    let name = strip_prefix(&common, &prefix).trim_end_matches('/');
                    if !name.is_empty() {
                        entries.push(DirEntry {
                            name: name.to_string(),
                            metadata: Metadata::directory(None),
                        });
                    }
                }

                match page.next_continuation_token {
                    Some(next) if page.is_truncated => token = Some(next),
                    _ => break,
                }
            }

            if !seen && !cleaned.is_empty() {
                return Err(Error::NotFound { path: cleaned.clone() });
            }
            sort_entries(&mut entries);
            Ok::<_, Error>(entries)
        })
        .await
    }

    async fn mkdir(&self, ctx: &Context, path: &str) -> Result<(), Error> {
        let (cleaned, key) = self.key(path)?;
        if cleaned.is_empty() {
            return Ok(());
        }
        ctx.run(async {
            let marker = format!("{}/", key);
            success(self.send(S3Request::new(Method::PUT, &marker)).await?, &cleaned).await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn remove(&self, ctx: &Context, path: &str) -> Result<(), Error> {
        let (cleaned, key) = self.key(path)?;
        if cleaned.is_empty() {
            return Err(Error::InvalidPath {
                message: "refusing to remove the backend root".to_string(),
            });
        }
        ctx.run(async {
            let meta = self.stat_key(&cleaned, &key).await?;
            if meta.is_file() {
                return self.delete_object(&key).await;
            }

            let marker = format!("{}/", key);
            let keys = self.keys_under(&marker).await?;
            if keys.iter().any(|k| *k != marker) {
                return Err(Error::from(S3Error::NotEmpty {
                    path: cleaned.clone(),
                }));
            }
            self.delete_object(&marker).await
        })
        .await
    }

    async fn rename(&self, ctx: &Context, from: &str, to: &str) -> Result<(), Error> {
        let (from_cleaned, from_key) = self.key(from)?;
        let (to_cleaned, to_key) = self.key(to)?;
        if from_cleaned.is_empty() || to_cleaned.is_empty() {
            return Err(Error::InvalidPath {
                message: "cannot rename the backend root".to_string(),
            });
        }

        ctx.run(async {
            let meta = self.stat_key(&from_cleaned, &from_key).await?;
            if meta.is_file() {
                self.copy_object(&from_key, &to_key).await?;
                return self.delete_object(&from_key).await;
            }

            // No server-side directory move: copy every object then delete.
            let from_prefix = format!("{}/", from_key);
            let to_prefix = format!("{}/", to_key);
            for key in self.keys_under(&from_prefix).await? {
                let target = format!("{}{}", to_prefix, strip_prefix(&key, &from_prefix));
                self.copy_object(&key, &target).await?;
                self.delete_object(&key).await?;
            }
            Ok::<_, Error>(())
        })
        .await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
