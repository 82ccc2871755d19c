pub mod common;
pub mod config;
pub mod content;
pub mod request;
pub mod response;
pub mod server;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::{determine_content_type, ContentKind, HttpStream};
use config::ServeOptions;
use content::{write_content, BodyMode};
use log::info;
use request::parse_http_request;
use response::{lookup, write_http_header, write_not_found, ResponseStatus};

/// Per-connection context: the stream, the options it is served with, and the
/// single timestamp used for every date the response contains.
pub struct ConnectionHandler<'a, S: HttpStream> {
    stream: &'a mut S,
    options: &'a ServeOptions,
    now: DateTime<Utc>,
}

impl<'a, S: HttpStream> ConnectionHandler<'a, S> {
    pub fn new(stream: &'a mut S, options: &'a ServeOptions) -> Self {
        Self::at(stream, options, Utc::now())
    }

    pub fn at(stream: &'a mut S, options: &'a ServeOptions, now: DateTime<Utc>) -> Self {
        Self {
            stream,
            options,
            now,
        }
    }

    /// Parses one request and answers it. The body is only sent when the
    /// header reported the file as found.
    pub fn run(self) -> Result<()> {
        let Some(request_line) = parse_http_request(self.stream) else {
            info!("No GET request line received");
            write_not_found(self.stream, self.options.not_found, &self.now)
                .context("Failed to write to stream")?;
            return self.finish();
        };

        let resource = request_line.relative_resource();
        let kind = ContentKind::from_path(resource);
        let content_type = determine_content_type(kind, resource);
        let status = lookup(&self.options.root, resource, self.options.confine);
        info!("GET /{} -> {:?} as {}", resource, kind, content_type);

        write_http_header(
            self.stream,
            &status,
            &content_type,
            self.options.not_found,
            &self.now,
        )
        .context("Failed to write to stream")?;

        if let ResponseStatus::Found(path) = &status {
            let mode = BodyMode::for_content(kind, &content_type);
            write_content(self.stream, path, mode, &self.now)?;
        }
        self.finish()
    }

    fn finish(self) -> Result<()> {
        self.stream.flush().context("Failed to flush stream")?;
        Ok(())
    }
}

pub fn handle_connection(stream: &mut impl HttpStream, options: &ServeOptions) -> Result<()> {
    ConnectionHandler::new(stream, options).run()
}
