//! Projections of a [`Conversation`]: live terminal output and a standalone
//! HTML page.

use std::collections::HashMap;
use std::io::{self, Write};

use colored::*;
use pulldown_cmark_escape::escape_html;

use crate::message::Role;
use crate::prefs::Theme;
use crate::reconciler::{ChangeKind, Conversation, MessageNode, ReconcileReport};

/// Streams conversation changes to a terminal.
///
/// New nodes get a header line (`role HH:MM`) followed by their Markdown
/// source. Updated nodes print only the appended text when the new source
/// extends what is already on screen, and are reprinted in full otherwise.
pub struct TerminalView<W: Write> {
    out: W,
    color: bool,
    printed: HashMap<String, String>,
    line_open: bool,
}

impl TerminalView<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            printed: HashMap::new(),
            line_open: false,
        }
    }

    /// Print every node the report touched, then scroll to the end.
    pub fn apply(
        &mut self,
        conversation: &Conversation,
        report: &ReconcileReport,
    ) -> io::Result<()> {
        for change in &report.changes {
            let Some(node) = conversation.get(&change.id) else {
                continue;
            };
            let shown = match self.printed.get(&node.id) {
                Some(prev) if node.source.starts_with(prev.as_str()) => Some(prev.len()),
                Some(_) => None,
                None => {
                    self.write_header(node, false)?;
                    Some(0)
                }
            };
            match shown {
                Some(offset) => self.out.write_all(node.source[offset..].as_bytes())?,
                None => {
                    // content was rewritten rather than extended
                    self.write_header(node, change.kind == ChangeKind::Updated)?;
                    self.out.write_all(node.source.as_bytes())?;
                }
            }
            self.printed.insert(node.id.clone(), node.source.clone());
            self.line_open = true;
        }
        self.scroll_to_end()
    }

    /// Close the current message once a response stream has ended.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.line_open {
            self.out.write_all(b"\n")?;
            self.line_open = false;
        }
        self.scroll_to_end()
    }

    /// Forget everything printed; the next change starts a fresh header.
    pub fn reset(&mut self) {
        self.printed.clear();
        self.line_open = false;
    }

    pub fn scroll_to_end(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_header(&mut self, node: &MessageNode, revised: bool) -> io::Result<()> {
        let label = match node.role {
            Role::User => "you".to_string(),
            _ => node.role.to_string(),
        };
        let suffix = if revised { " (revised)" } else { "" };
        let lead = if self.line_open { "\n\n" } else { "\n" };
        if self.color {
            let name = match node.role {
                Role::User => label.bright_green().bold(),
                _ => label.bright_cyan().bold(),
            };
            writeln!(self.out, "{lead}{} {}{}", name, node.clock.bright_black(), suffix.yellow())
        } else {
            writeln!(self.out, "{lead}{} {}{}", label, node.clock, suffix)
        }
    }
}

const PAGE_STYLE: &str = "\
body{font-family:system-ui,sans-serif;max-width:52rem;margin:2rem auto}
body{background:#fff;color:#1f2328}
body.dark-theme{background:#0d1117;color:#c9d1d9}
.message{margin:1rem 0;padding:.75rem 1rem;border-radius:8px}
.message.user{background:#ddf4ff}
.message.model{background:#f6f8fa}
.dark-theme .message.user{background:#132339}
.dark-theme .message.model{background:#161b22}
.message-meta{font-size:.75rem;opacity:.6;text-align:right}
pre{overflow-x:auto}";

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    // writing into a String cannot fail
    let _ = escape_html(&mut out, s);
    out
}

/// One `<div class="message …">` per node, in conversation order.
pub fn export_html(conversation: &Conversation, theme: Theme) -> String {
    let body_class = match theme {
        Theme::Dark => " class=\"dark-theme\"",
        Theme::Light => "",
    };
    let mut page = String::new();
    page.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str("<title>Chat history</title>\n<style>\n");
    page.push_str(PAGE_STYLE);
    page.push_str("\n</style>\n</head>\n");
    page.push_str(&format!("<body{body_class}>\n<div id=\"conversation\">\n"));
    for node in conversation {
        page.push_str(&format!(
            "<div id=\"{}\" class=\"message {}\">",
            escape_attr(&node.id),
            node.role.css_class(),
        ));
        page.push_str(&format!(
            "<div class=\"message-content\">{}</div><div class=\"message-meta\">{}</div></div>\n",
            node.content_html,
            escape_attr(&node.clock),
        ));
    }
    page.push_str("</div>\n</body>\n</html>\n");
    page
}
