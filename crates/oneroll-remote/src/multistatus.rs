//! WebDAV multistatus parsing
//!
//! Only two facts are needed from each `<response>`: its `<href>` and
//! whether its resource type carries a `<collection/>` marker. Elements are
//! matched by local name, so any namespace prefix (`d:`, `D:`, none) works.

use oneroll_core::domain::RemoteError;
use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use url::Url;

/// One `<response>` of a multistatus document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavEntry {
    /// Last path segment of the decoded href
    pub name: String,
    /// Decoded href path without trailing slash
    pub path: String,
    pub is_collection: bool,
}

/// Decodes an href into its path without trailing slash
///
/// Servers report either absolute URLs or absolute paths.
pub fn href_path(href: &str) -> String {
    let href = href.trim();
    let raw_path = match Url::parse(href) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => href.to_string(),
    };
    let decoded = percent_decode_str(&raw_path).decode_utf8_lossy();
    decoded.trim_end_matches('/').to_string()
}

fn entry_from_href(href: &str, is_collection: bool) -> Option<DavEntry> {
    let path = href_path(href);
    let name = path.rsplit('/').next().unwrap_or_default().to_string();
    if name.trim().is_empty() {
        return None;
    }
    Some(DavEntry {
        name,
        path,
        is_collection,
    })
}

/// Parses a PROPFIND multistatus body
///
/// Responses without an href, or whose href has no final segment, are
/// skipped.
pub fn parse_multistatus(xml: &str) -> Result<Vec<DavEntry>, RemoteError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut in_response = false;
    let mut in_href = false;
    let mut href = String::new();
    let mut is_collection = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            RemoteError::MalformedResponse(format!(
                "multistatus parse error at {}: {e}",
                reader.buffer_position()
            ))
        })?;
        match event {
            Event::Start(tag) => match tag.local_name().as_ref() {
                b"response" => {
                    in_response = true;
                    href.clear();
                    is_collection = false;
                }
                b"href" if in_response => in_href = true,
                b"collection" if in_response => is_collection = true,
                _ => {}
            },
            Event::Empty(tag) => {
                if in_response && tag.local_name().as_ref() == b"collection" {
                    is_collection = true;
                }
            }
            Event::Text(text) if in_href => {
                let text = text.unescape().map_err(|e| {
                    RemoteError::MalformedResponse(format!("invalid href text: {e}"))
                })?;
                href.push_str(&text);
            }
            Event::CData(data) if in_href => {
                href.push_str(&String::from_utf8_lossy(&data.into_inner()));
            }
            Event::End(tag) => match tag.local_name().as_ref() {
                b"href" => in_href = false,
                b"response" if in_response => {
                    in_response = false;
                    if let Some(entry) = entry_from_href(&href, is_collection) {
                        entries.push(entry);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}
