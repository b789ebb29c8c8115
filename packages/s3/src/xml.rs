//! ListObjectsV2 and error document parsing.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::S3Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListResult {
    pub contents: Vec<ObjectSummary>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

fn malformed(e: impl std::fmt::Display) -> S3Error {
    S3Error::Response {
        message: e.to_string(),
    }
}

/// Walk the document calling `on_text(element_stack, text)` for every text
/// node and `on_end(element_stack)` before each element closes.
fn walk(
    xml: &str,
    mut on_text: impl FnMut(&[String], String),
    mut on_end: impl FnMut(&[String]),
) -> Result<(), S3Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Event::End(_) => {
                on_end(&stack);
                stack.pop();
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(malformed)?.into_owned();
                on_text(&stack, text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

pub fn parse_list(xml: &str) -> Result<ListResult, S3Error> {
    let result = std::cell::RefCell::new(ListResult::default());
    let current: std::cell::RefCell<Option<ObjectSummary>> = std::cell::RefCell::new(None);
    let mut bad_field: Option<String> = None;

    walk(
        xml,
        |stack, text| {
            let names: Vec<&str> = stack.iter().map(String::as_str).collect();
            match names.as_slice() {
                [.., "Contents", "Key"] => {
                    current.borrow_mut().get_or_insert_with(empty_summary).key = text;
                }
                [.., "Contents", "Size"] => match text.parse() {
                    Ok(size) => current.borrow_mut().get_or_insert_with(empty_summary).size = size,
                    Err(_) => bad_field = Some(format!("Size {:?}", text)),
                },
                [.., "Contents", "LastModified"] => {
                    current.borrow_mut().get_or_insert_with(empty_summary).last_modified =
                        DateTime::parse_from_rfc3339(&text)
                            .ok()
                            .map(|t| t.with_timezone(&Utc));
                }
                [.., "CommonPrefixes", "Prefix"] => result.borrow_mut().common_prefixes.push(text),
                [_, "IsTruncated"] => result.borrow_mut().is_truncated = text == "true",
                [_, "NextContinuationToken"] => result.borrow_mut().next_continuation_token = Some(text),
                _ => {}
            }
        },
        |stack| {
            if stack.last().map(String::as_str) == Some("Contents") {
                if let Some(summary) = current.borrow_mut().take() {
                    result.borrow_mut().contents.push(summary);
                }
            }
        },
    )?;

    match bad_field {
        Some(field) => Err(malformed(format!("invalid {}", field))),
        None => Ok(result.into_inner()),
    }
}

fn empty_summary() -> ObjectSummary {
    ObjectSummary {
        key: String::new(),
        size: 0,
        last_modified: None,
    }
}

/// `(Code, Message)` of an S3 error document. Missing fields come back empty.
pub fn parse_error(xml: &str) -> (String, String) {
    let mut code = String::new();
    let mut message = String::new();
    let parsed = walk(
        xml,
        |stack, text| match stack.last().map(String::as_str) {
            Some("Code") => code = text,
            Some("Message") => message = text,
            _ => {}
        },
        |_| {},
    );
    if parsed.is_err() {
        return (String::new(), xml.trim().to_string());
    }
    (code, message)
}
