use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use crate::common::{http_date, ContentKind, HttpStream, SERVER_NAME};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{trace, warn};
use mime_guess::{mime, Mime};

pub const DATE_MARKER: &[u8] = b"<cs371date>";
pub const SERVER_MARKER: &[u8] = b"<cs371server>";
pub const MARKER_DELIMITER: &[u8] = b"<br>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Bytes are copied verbatim.
    Raw,
    /// Lines are scanned for template markers.
    Template,
}

impl BodyMode {
    pub fn for_content(kind: ContentKind, content_type: &Mime) -> Self {
        match kind {
            ContentKind::Jpeg | ContentKind::Gif | ContentKind::Png => BodyMode::Raw,
            ContentKind::Html => BodyMode::Template,
            ContentKind::Unknown if content_type.type_() == mime::TEXT => BodyMode::Template,
            ContentKind::Unknown => BodyMode::Raw,
        }
    }
}

/// Splits a chunk read up to `\n` into lines paired with their terminators.
/// `\r\n`, `\n` and a lone `\r` all end a line; the last line may have none.
fn split_lines(chunk: &[u8]) -> Vec<(&[u8], &[u8])> {
    let mut lines = Vec::new();
    let (mut start, mut at) = (0, 0);

    while at < chunk.len() {
        let terminator_len = match (chunk[at], chunk.get(at + 1)) {
            (b'\r', Some(b'\n')) => 2,
            (b'\r' | b'\n', _) => 1,
            _ => 0,
        };
        if terminator_len == 0 {
            at += 1;
            continue;
        }
        lines.push((&chunk[start..at], &chunk[at..at + terminator_len]));
        at += terminator_len;
        start = at;
    }
    if start < chunk.len() {
        lines.push((&chunk[start..], &chunk[chunk.len()..]));
    }
    lines
}

/// Copies `reader` to `writer` line by line, replacing lines that consist of
/// exactly one template marker. Line terminators are preserved.
pub fn substitute_templates(
    reader: &mut impl BufRead,
    writer: &mut impl Write,
    now: &DateTime<Utc>,
) -> io::Result<()> {
    let date = http_date(now);
    let mut chunk = Vec::new();

    loop {
        chunk.clear();
        if reader.read_until(b'\n', &mut chunk)? == 0 {
            return Ok(());
        }

        for (content, terminator) in split_lines(&chunk) {
            let replacement = if content == DATE_MARKER {
                date.as_bytes()
            } else if content == SERVER_MARKER {
                SERVER_NAME.as_bytes()
            } else {
                writer.write_all(content)?;
                writer.write_all(terminator)?;
                continue;
            };

            trace!("Substituting {}", String::from_utf8_lossy(content));
            writer.write_all(MARKER_DELIMITER)?;
            writer.write_all(replacement)?;
            writer.write_all(MARKER_DELIMITER)?;
            writer.write_all(terminator)?;
        }
    }
}

/// Streams the file at `path` as the response body.
///
/// A file that has vanished or become unreadable since the header was written
/// gets a single blank line instead of an error.
pub fn write_content(
    stream: &mut impl HttpStream,
    path: &Path,
    mode: BodyMode,
    now: &DateTime<Utc>,
) -> Result<()> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            warn!("Can't open {:?} for the body: {}", path, err);
            stream.write_all(b"\n")?;
            return Ok(());
        }
    };

    let mut writer = BufWriter::new(stream);
    match mode {
        BodyMode::Raw => {
            io::copy(&mut BufReader::new(file), &mut writer)
                .with_context(|| format!("Failed to send {:?}", path))?;
        }
        BodyMode::Template => {
            substitute_templates(&mut BufReader::new(file), &mut writer, now)
                .with_context(|| format!("Failed to send {:?}", path))?;
        }
    }
    writer.flush().context("Failed to flush body")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::TimeZone;

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 29, 8, 5, 0).unwrap()
    }

    fn render(input: &[u8]) -> Vec<u8> {
        let mut output = Vec::new();
        substitute_templates(&mut Cursor::new(input), &mut output, &fixed_now()).unwrap();
        output
    }

    #[test]
    fn plain_text_is_unchanged() {
        let page = b"<html>\r\n<body>hello</body>\n</html>";
        assert_eq!(render(page), page.to_vec());
    }

    #[test]
    fn date_marker_is_replaced() {
        let output = render(b"<p>\n<cs371date>\n</p>\n");
        assert_eq!(
            output,
            b"<p>\n<br>Thu, 29 Feb 2024 08:05:00 GMT<br>\n</p>\n".to_vec()
        );
    }

    #[test]
    fn server_marker_is_replaced() {
        let output = render(b"<cs371server>\r\n");
        let expected = format!("<br>{}<br>\r\n", SERVER_NAME);
        assert_eq!(output, expected.into_bytes());
    }

    #[test]
    fn marker_on_last_line_without_newline() {
        let output = render(b"top\n<cs371server>");
        let expected = format!("top\n<br>{}<br>", SERVER_NAME);
        assert_eq!(output, expected.into_bytes());
    }

    #[test]
    fn bare_carriage_returns_end_lines() {
        let output = render(b"<p>\r<cs371date>\r</p>\r");
        assert_eq!(
            output,
            b"<p>\r<br>Thu, 29 Feb 2024 08:05:00 GMT<br>\r</p>\r".to_vec()
        );
    }

    #[test]
    fn split_lines_keeps_terminators() {
        let lines = split_lines(b"a\r\nb\rc\n");
        assert_eq!(
            lines,
            vec![
                (&b"a"[..], &b"\r\n"[..]),
                (&b"b"[..], &b"\r"[..]),
                (&b"c"[..], &b"\n"[..]),
            ]
        );
        assert_eq!(split_lines(b"tail"), vec![(&b"tail"[..], &b""[..])]);
    }

    #[test]
    fn markers_must_fill_the_whole_line() {
        let page = b"today: <cs371date>\n <cs371server>\n<CS371DATE>\n";
        assert_eq!(render(page), page.to_vec());
    }

    #[test]
    fn body_mode_by_kind() {
        assert_eq!(
            BodyMode::for_content(ContentKind::Png, &mime::IMAGE_PNG),
            BodyMode::Raw
        );
        assert_eq!(
            BodyMode::for_content(ContentKind::Html, &mime::TEXT_HTML),
            BodyMode::Template
        );
        assert_eq!(
            BodyMode::for_content(ContentKind::Unknown, &mime::TEXT_PLAIN),
            BodyMode::Template
        );
        assert_eq!(
            BodyMode::for_content(ContentKind::Unknown, &mime::APPLICATION_OCTET_STREAM),
            BodyMode::Raw
        );
    }

    #[test]
    fn unopenable_file_writes_blank_line() {
        let mut stream = Cursor::new(Vec::new());
        let path = std::env::temp_dir().join("tinyserve-content-definitely-missing.html");
        write_content(&mut stream, &path, BodyMode::Template, &fixed_now()).unwrap();
        assert_eq!(stream.into_inner(), b"\n");
    }

    #[test]
    fn raw_body_is_byte_identical() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let path =
            std::env::temp_dir().join(format!("tinyserve-content-{}.png", std::process::id()));
        std::fs::write(&path, &data).unwrap();

        let mut stream = Cursor::new(Vec::new());
        write_content(&mut stream, &path, BodyMode::Raw, &fixed_now()).unwrap();
        assert_eq!(stream.into_inner(), data);
    }
}
