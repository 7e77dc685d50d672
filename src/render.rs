use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use pulldown_cmark::{html, CowStr, Event, Options, Parser};

/// Default cap on Markdown source size before falling back to literal text.
pub const DEFAULT_MAX_MARKDOWN_BYTES: usize = 1024 * 1024;

/// Shown in the metadata region when a timestamp cannot be parsed.
pub const UNKNOWN_CLOCK: &str = "--:--";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    TooLarge { len: usize, limit: usize },
    Rejected(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::TooLarge { len, limit } => {
                write!(f, "markdown source is {len} bytes, limit is {limit}")
            }
            RenderError::Rejected(why) => write!(f, "markdown rejected: {why}"),
        }
    }
}

impl std::error::Error for RenderError {}

/// Turns a message body into the HTML of its content region.
pub trait ContentRenderer {
    fn render(&self, source: &str) -> Result<String, RenderError>;
}

/// GitHub-flavoured Markdown via pulldown-cmark. Raw HTML in the source is
/// escaped rather than passed through.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    max_source_bytes: usize,
    options: Options,
}

impl MarkdownRenderer {
    pub fn new(max_source_bytes: usize) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        Self {
            max_source_bytes,
            options,
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MARKDOWN_BYTES)
    }
}

impl ContentRenderer for MarkdownRenderer {
    fn render(&self, source: &str) -> Result<String, RenderError> {
        if source.len() > self.max_source_bytes {
            return Err(RenderError::TooLarge {
                len: source.len(),
                limit: self.max_source_bytes,
            });
        }
        let parser = Parser::new_ext(source, self.options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });
        let mut out = String::with_capacity(source.len() + source.len() / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}

impl<R: ContentRenderer + ?Sized> ContentRenderer for Box<R> {
    fn render(&self, source: &str) -> Result<String, RenderError> {
        (**self).render(source)
    }
}

/// HTML-escaped text, used when Markdown conversion fails.
pub fn literal_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    html::push_html(&mut out, std::iter::once(Event::Text(CowStr::Borrowed(text))));
    out
}

/// Render `source`, or fall back to its literal text. Never drops the body.
pub fn render_or_literal<R: ContentRenderer + ?Sized>(renderer: &R, source: &str) -> String {
    match renderer.render(source) {
        Ok(html) => html,
        Err(e) => {
            tracing::error!(error = %e, "markdown rendering failed, showing literal text");
            literal_html(source)
        }
    }
}

/// Element id of the node for `timestamp`: `msg-` plus the timestamp with
/// every `:` and `.` replaced by `-`.
pub fn node_id(timestamp: &str) -> String {
    let mut id = String::with_capacity(timestamp.len() + 4);
    id.push_str("msg-");
    id.extend(timestamp.chars().map(|c| if c == ':' || c == '.' { '-' } else { c }));
    id
}

/// Two-digit `HH:MM` of `timestamp` in the local time zone.
pub fn clock_label(timestamp: &str) -> String {
    clock_label_in(timestamp, &Local)
}

/// Two-digit `HH:MM` of `timestamp` in `tz`. RFC 3339 timestamps keep their
/// offset; naive ones (`2024-01-01T10:00:00.123`) are wall-clock time in `tz`.
pub fn clock_label_in<Tz>(timestamp: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let trimmed = timestamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.with_timezone(tz).format("%H:%M").to_string();
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.format("%H:%M").to_string())
        .unwrap_or_else(|| UNKNOWN_CLOCK.to_string())
}
