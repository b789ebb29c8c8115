//! `207 Multi-Status` bodies returned by PROPFIND.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::WebDavError;

/// Request body asking for the properties [`parse_multistatus`] reads.
pub const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
  </d:prop>
</d:propfind>"#;

/// One `<response>` element.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Raw, still percent-encoded `href`.
    pub href: String,
    pub collection: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

fn malformed(e: impl std::fmt::Display) -> WebDavError {
    WebDavError::Response {
        message: e.to_string(),
    }
}

pub fn parse_multistatus(xml: &str) -> Result<Vec<Resource>, WebDavError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut resources = Vec::new();
    let mut current: Option<Resource> = None;
    let mut element = String::new();

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => {
                element = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match element.as_str() {
                    "response" => current = Some(Resource::default()),
                    "collection" => {
                        if let Some(resource) = current.as_mut() {
                            resource.collection = true;
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"collection" {
                    if let Some(resource) = current.as_mut() {
                        resource.collection = true;
                    }
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(malformed)?;
                let Some(resource) = current.as_mut() else {
                    continue;
                };
                match element.as_str() {
                    "href" => resource.href = text.trim().to_string(),
                    "getcontentlength" => resource.size = text.trim().parse().unwrap_or(0),
                    "getlastmodified" => {
                        resource.modified = DateTime::parse_from_rfc2822(text.trim())
                            .ok()
                            .map(|t| t.with_timezone(&Utc));
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"response" {
                    if let Some(resource) = current.take() {
                        resources.push(resource);
                    }
                }
                element.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(resources)
}
