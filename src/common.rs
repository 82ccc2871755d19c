use std::io::{Read, Write};

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use mime_guess::{mime, Mime};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum HttpError {
    #[error("Unsupported HTTP method {0}")]
    UnsupportedHttpMethod(String),
    #[error("Malformed HTTP request line: `{0}`")]
    MalformedRequestLine(String),
    #[error("Encountered invalid UTF8 while parsing HTTP request")]
    InvalidUTF8Char,
    #[error(
        "Request header size exceeded maximum allowed size {}",
        MAX_HEADER_SIZE
    )]
    HeaderSizeLimit,
}

pub const MAX_HEADER_SIZE: u64 = ByteSize::kb(8).as_u64();

pub const SERVER_NAME: &str = concat!("tinyserve/", env!("CARGO_PKG_VERSION"));

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

pub trait HttpStream: Read + Write {}
impl<T: Read + Write> HttpStream for T {}

/// Formats a timestamp the way it appears in the `Date` header and in the
/// date template marker.
pub fn http_date(at: &DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// Closed set of resources this server knows how to label.
///
/// The extension match is exact and case-sensitive: `photo.PNG` is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Jpeg,
    Gif,
    Png,
    Html,
    Unknown,
}

impl ContentKind {
    /// Classifies a slash-stripped resource path by the token after its last `.`.
    pub fn from_path(resource: &str) -> Self {
        let Some((_, extension)) = resource.rsplit_once('.') else {
            return ContentKind::Unknown;
        };

        match extension {
            "jpeg" => ContentKind::Jpeg,
            "gif" => ContentKind::Gif,
            "png" => ContentKind::Png,
            "html" => ContentKind::Html,
            _ => ContentKind::Unknown,
        }
    }

    pub fn mime(&self) -> Option<Mime> {
        match self {
            ContentKind::Jpeg => Some(mime::IMAGE_JPEG),
            ContentKind::Gif => Some(mime::IMAGE_GIF),
            ContentKind::Png => Some(mime::IMAGE_PNG),
            ContentKind::Html => Some(mime::TEXT_HTML),
            ContentKind::Unknown => None,
        }
    }
}

// Unknown kinds get a best-effort guess so the header is never left without a type.
pub fn determine_content_type(kind: ContentKind, resource: &str) -> Mime {
    kind.mime()
        .unwrap_or_else(|| mime_guess::from_path(resource).first_or_octet_stream())
}
