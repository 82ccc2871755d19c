use std::{
    fmt, fs, io,
    path::{Component, Path, PathBuf},
};

use crate::common::{http_date, HttpStream, SERVER_NAME};
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::warn;
use mime_guess::{mime, Mime};

/// Body written in place of a response when the resource is missing.
pub const NOT_FOUND_TOKEN: &str = "404 file not found ";

#[derive(Debug, Clone, Copy)]
pub enum HttpResponseStatusCode {
    OK = 200,
    NotFound = 404,
}

impl fmt::Display for HttpResponseStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpResponseStatusCode::OK => f.write_str("OK"),
            HttpResponseStatusCode::NotFound => f.write_str("Not Found"),
        }
    }
}

/// How a missing resource is reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum NotFoundStyle {
    /// The bare `404 file not found ` token with no status line or headers.
    #[default]
    Legacy,
    /// A complete `HTTP/1.1 404 Not Found` response.
    Conformant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseStatus {
    Found(PathBuf),
    NotFound,
}

/// Joins `resource` onto `root` and checks that it names a regular file.
///
/// With `confine` set, any `..`, root or prefix component makes the resource
/// not found instead of letting it escape `root`.
pub fn lookup(root: &Path, resource: &str, confine: bool) -> ResponseStatus {
    let relative = Path::new(resource);
    if confine
        && relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
    {
        warn!("Refusing to leave document root for {:?}", resource);
        return ResponseStatus::NotFound;
    }

    let path = root.join(relative);
    match fs::metadata(&path) {
        Ok(metadata) if metadata.is_file() => ResponseStatus::Found(path),
        Ok(_) => ResponseStatus::NotFound,
        Err(err) if err.kind() == io::ErrorKind::NotFound => ResponseStatus::NotFound,
        Err(err) => {
            warn!("Can't inspect {:?}: {}", path, err);
            ResponseStatus::NotFound
        }
    }
}

#[derive(Debug)]
pub struct HTTPResponseMessage {
    status_code: HttpResponseStatusCode,
    version: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

pub struct HTTPResponseBuilder(HTTPResponseMessage);
impl HTTPResponseBuilder {
    pub fn new(http_status_code: HttpResponseStatusCode, version: &str) -> Self {
        Self(HTTPResponseMessage {
            status_code: http_status_code,
            version: String::from(version),
            headers: Vec::new(),
            body: vec![],
        })
    }

    pub fn header(
        mut self,
        header_name: impl Into<String>,
        header_content: impl Into<String>,
    ) -> Self {
        self.0
            .headers
            .push((header_name.into(), header_content.into()));
        self
    }

    pub fn body(mut self, body: &[u8]) -> Self {
        self.0.body = Vec::from(body);
        let body_length = self.0.body.len();
        self.header("Content-Length", body_length.to_string())
    }

    pub fn build(self) -> HTTPResponseMessage {
        self.0
    }
}

impl HTTPResponseMessage {
    /// Writes the status line, headers in insertion order, the blank line and
    /// the body. Lines end with a bare `\n`.
    pub fn write_to(&self, stream: &mut impl HttpStream) -> Result<()> {
        let mut response = format!(
            "HTTP/{} {} {}\n",
            self.version,
            self.status_code as u16,
            self.status_code
        );

        for (header_name, header_content) in &self.headers {
            response.push_str(&format!("{}: {}\n", header_name, header_content));
        }
        response.push('\n');

        stream.write_all(response.as_bytes())?;
        stream.write_all(&self.body)?;
        Ok(())
    }
}

fn common_headers(
    status_code: HttpResponseStatusCode,
    now: &DateTime<Utc>,
) -> HTTPResponseBuilder {
    HTTPResponseBuilder::new(status_code, "1.1")
        .header("Date", http_date(now))
        .header("Server", SERVER_NAME)
        .header("Connection", "close")
}

pub fn build_http_header(content_type: &Mime, now: &DateTime<Utc>) -> HTTPResponseMessage {
    common_headers(HttpResponseStatusCode::OK, now)
        .header("Content-Type", content_type.to_string())
        .build()
}

/// Writes the header block for `status`. A missing resource gets its complete
/// answer here; nothing may follow it.
pub fn write_http_header(
    stream: &mut impl HttpStream,
    status: &ResponseStatus,
    content_type: &Mime,
    not_found: NotFoundStyle,
    now: &DateTime<Utc>,
) -> Result<()> {
    match status {
        ResponseStatus::Found(_) => build_http_header(content_type, now).write_to(stream),
        ResponseStatus::NotFound => write_not_found(stream, not_found, now),
    }
}

pub fn write_not_found(
    stream: &mut impl HttpStream,
    style: NotFoundStyle,
    now: &DateTime<Utc>,
) -> Result<()> {
    match style {
        NotFoundStyle::Legacy => stream.write_all(NOT_FOUND_TOKEN.as_bytes())?,
        NotFoundStyle::Conformant => common_headers(HttpResponseStatusCode::NotFound, now)
            .header("Content-Type", mime::TEXT_PLAIN.to_string())
            .body(NOT_FOUND_TOKEN.trim_end().as_bytes())
            .build()
            .write_to(stream)?,
    }
    Ok(())
}
