use std::{
    io::{BufRead, BufReader, Read, Take},
    str::FromStr,
};

use crate::common::{HttpError, HttpStream, MAX_HEADER_SIZE};
use anyhow::{anyhow, Result};
use log::{debug, warn};

#[derive(Debug, enum_utils::FromStr, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    OPTIONS,
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    TRACE,
    CONNECT,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestLine {
    method: HttpRequestMethod,
    resource: String,
    version: String,
}

impl HttpRequestLine {
    pub fn new(method: HttpRequestMethod, resource: String, version: String) -> Self {
        Self {
            method,
            resource,
            version,
        }
    }

    pub fn get_method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn get_resource(&self) -> &str {
        &self.resource
    }

    pub fn get_version(&self) -> &str {
        &self.version
    }

    /// The requested path with its leading slash removed, ready to be joined
    /// onto the document root.
    pub fn relative_resource(&self) -> &str {
        self.resource.strip_prefix('/').unwrap_or(&self.resource)
    }
}

impl FromStr for HttpRequestLine {
    type Err = HttpError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split(' ').filter(|token| !token.is_empty());
        let Some(method) = tokens.next() else {
            return Err(HttpError::MalformedRequestLine(line.to_string()));
        };
        let method = HttpRequestMethod::from_str(method)
            .map_err(|_| HttpError::UnsupportedHttpMethod(method.to_string()))?;

        let (Some(resource), Some(version)) = (tokens.next(), tokens.next()) else {
            return Err(HttpError::MalformedRequestLine(line.to_string()));
        };

        Ok(Self::new(method, resource.to_string(), version.to_string()))
    }
}

fn read_header_line<R: Read>(reader: &mut BufReader<Take<R>>) -> Result<Option<String>> {
    let mut raw = Vec::new();
    let read = reader.read_until(b'\n', &mut raw)?;
    if read == 0 {
        return Ok(None);
    }
    if raw.last() != Some(&b'\n') && reader.get_ref().limit() == 0 {
        return Err(anyhow!(HttpError::HeaderSizeLimit));
    }

    while matches!(raw.last(), Some(b'\n' | b'\r')) {
        raw.pop();
    }
    let line = String::from_utf8(raw).map_err(|_| anyhow!(HttpError::InvalidUTF8Char))?;
    Ok(Some(line))
}

/// Reads the request header block and returns the last `GET` request line
/// seen in it.
///
/// Header lines and request lines for other methods are ignored. Reading stops
/// at the blank line that ends the header block, at end of stream, on a read
/// error, or on a request line missing its path or version. None of these are
/// errors for the caller, which receives whatever was captured up to that
/// point.
pub fn parse_http_request(stream: &mut impl HttpStream) -> Option<HttpRequestLine> {
    let mut buf_reader = BufReader::new(Read::by_ref(stream).take(MAX_HEADER_SIZE));
    let mut request_line = None;

    loop {
        let line = match read_header_line(&mut buf_reader) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                match err.downcast_ref::<HttpError>() {
                    Some(HttpError::InvalidUTF8Char) => {
                        warn!("Skipping request line: {}", err);
                        continue;
                    }
                    _ => warn!("Request error: {:#}", err),
                }
                break;
            }
        };

        debug!("Request line: ({})", line);
        if line.is_empty() {
            break;
        }
        match line.parse::<HttpRequestLine>() {
            Ok(parsed) if parsed.get_method() == HttpRequestMethod::GET => {
                request_line = Some(parsed)
            }
            Ok(parsed) => debug!("Ignoring {:?} request line", parsed.get_method()),
            // an ordinary header line
            Err(HttpError::UnsupportedHttpMethod(_)) => continue,
            Err(err) => {
                warn!("Request error: {}", err);
                break;
            }
        }
    }

    request_line
}
