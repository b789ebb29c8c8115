//! S3 configuration derived from an endpoint.
//!
//! `s3://ACCESS_KEY:SECRET@host[:port]/bucket[/prefix][?region=..&insecure=true]`

use std::fmt;

use unifs_core::path::clean;
use unifs_core::Endpoint;
use url::Url;

use crate::S3Error;

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
    /// `scheme://host[:port]` of the service.
    pub endpoint_url: Url,
    pub bucket: String,
    /// Key prefix inside the bucket, no leading or trailing slash.
    pub prefix: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl S3Config {
    /// Validate an endpoint and build the configuration.
    ///
    /// # Errors
    ///
    /// - [`S3Error::MissingCredentials`] without username and password
    /// - [`S3Error::MissingBucket`] / [`S3Error::InvalidBucket`]
    /// - [`S3Error::InvalidConfig`] for a missing host or unusable region
    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self, S3Error> {
        if endpoint.hostname.is_empty() {
            return Err(S3Error::InvalidConfig {
                message: "missing host".to_string(),
            });
        }
        if endpoint.username.is_empty() || endpoint.password.is_empty() {
            return Err(S3Error::MissingCredentials);
        }

        let cleaned = clean(&endpoint.path).map_err(|e| S3Error::InvalidConfig {
            message: e.to_string(),
        })?;
        let (bucket, prefix) = match cleaned.split_once('/') {
            Some((bucket, prefix)) => (bucket.to_string(), prefix.to_string()),
            None => (cleaned, String::new()),
        };
        if bucket.is_empty() {
            return Err(S3Error::MissingBucket);
        }
        validate_bucket(&bucket)?;

        let region = endpoint.extra("region").unwrap_or(DEFAULT_REGION).to_string();
        if region.is_empty() || !region.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(S3Error::InvalidConfig {
                message: format!("invalid region {:?}", region),
            });
        }

        let scheme = if endpoint.extra_flag("insecure") {
            "http"
        } else {
            "https"
        };
        let endpoint_url = Url::parse(&format!("{}://{}", scheme, endpoint.host()))?;

        Ok(Self {
            endpoint_url,
            bucket,
            prefix,
            region,
            access_key_id: endpoint.username.clone(),
            secret_access_key: endpoint.password.clone(),
        })
    }

    /// Value of the `host` header requests are signed with.
    pub fn host_header(&self) -> String {
        let host = self.endpoint_url.host_str().unwrap_or_default();
        match self.endpoint_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

fn validate_bucket(bucket: &str) -> Result<(), S3Error> {
    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if (3..=63).contains(&bucket.len()) && valid_chars && valid_edges {
        Ok(())
    } else {
        Err(S3Error::InvalidBucket {
            bucket: bucket.to_string(),
        })
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint_url", &self.endpoint_url.as_str())
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str) -> Result<S3Config, S3Error> {
        S3Config::from_endpoint(&address.parse().unwrap())
    }

    #[test]
    fn bucket_and_prefix_from_path() {
        let c = config("s3://ak:sk@minio.local:9000/data/a/b?region=eu-west-1").unwrap();
        assert_eq!(c.bucket, "data");
        assert_eq!(c.prefix, "a/b");
        assert_eq!(c.region, "eu-west-1");
        assert_eq!(c.endpoint_url.as_str(), "https://minio.local:9000/");
        assert_eq!(c.host_header(), "minio.local:9000");
    }

    #[test]
    fn insecure_selects_http() {
        let c = config("s3://ak:sk@127.0.0.1:9000/data?insecure=true").unwrap();
        assert_eq!(c.endpoint_url.scheme(), "http");
        assert_eq!(c.region, DEFAULT_REGION);
        assert_eq!(c.prefix, "");
    }

    #[test]
    fn default_port_is_not_signed() {
        let c = config("s3://ak:sk@s3.example.com:443/data").unwrap();
        assert_eq!(c.host_header(), "s3.example.com");
    }

    #[test]
    fn missing_credentials() {
        assert!(matches!(config("s3://host/data"), Err(S3Error::MissingCredentials)));
        assert!(matches!(config("s3://ak@host/data"), Err(S3Error::MissingCredentials)));
    }

    #[test]
    fn missing_or_invalid_bucket() {
        assert!(matches!(config("s3://ak:sk@host/"), Err(S3Error::MissingBucket)));
        assert!(matches!(
            config("s3://ak:sk@host/Upper_Case"),
            Err(S3Error::InvalidBucket { .. })
        ));
        assert!(matches!(config("s3://ak:sk@host/ab"), Err(S3Error::InvalidBucket { .. })));
    }

    #[test]
    fn invalid_region() {
        assert!(matches!(
            config("s3://ak:sk@host/data?region=bad%20region"),
            Err(S3Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn debug_masks_secret() {
        let c = config("s3://ak:topsecret@host/data").unwrap();
        assert!(!format!("{:?}", c).contains("topsecret"));
    }
}
