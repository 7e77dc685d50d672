//! Incremental reconciliation of a streamed NDJSON response into a
//! conversation.
//!
//! The transport hands over the *whole* response text received so far every
//! time a chunk arrives, and once more when the stream ends. Each call walks
//! every complete line again and creates or updates one [`MessageNode`] per
//! node id, so calling [`Reconciler::reconcile`] repeatedly with a growing
//! buffer converges on the same state as a single call with the final buffer.
//!
//! The [`Conversation`] is the authoritative model; the terminal output and
//! the HTML export in [`crate::view`] are projections of it.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::message::{candidate_lines, parse_line, ChatMessage, ParsedLine, Role};
use crate::render::{
    clock_label, literal_html, node_id, render_or_literal, ContentRenderer, MarkdownRenderer,
};

/// One rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageNode {
    pub id: String,
    pub role: Role,
    /// Markdown source the content region was rendered from.
    pub source: String,
    /// Content region.
    pub content_html: String,
    /// Metadata region, fixed at creation.
    pub clock: String,
}

/// Ordered set of nodes with at most one node per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    nodes: Vec<MessageNode>,
    index: HashMap<String, usize>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MessageNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessageNode> {
        self.nodes.iter()
    }

    pub fn nodes(&self) -> &[MessageNode] {
        &self.nodes
    }

    fn push(&mut self, node: MessageNode) {
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut MessageNode> {
        match self.index.get(id) {
            Some(&i) => self.nodes.get_mut(i),
            None => None,
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a MessageNode;
    type IntoIter = std::slice::Iter<'a, MessageNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
}

/// A node touched by one `reconcile` call, in first-touched order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeChange {
    pub id: String,
    pub kind: ChangeKind,
}

/// What one `reconcile` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub changes: Vec<NodeChange>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    fn touch(&mut self, id: &str, kind: ChangeKind) {
        // a node created earlier in the same call stays "created"
        if self.changes.iter().any(|c| c.id == id) {
            return;
        }
        self.changes.push(NodeChange {
            id: id.to_string(),
            kind,
        });
    }
}

pub struct Reconciler<R = MarkdownRenderer> {
    renderer: R,
    conversation: Conversation,
    clock: fn(&str) -> String,
    scroll_requests: u64,
}

impl Reconciler<MarkdownRenderer> {
    pub fn with_markdown(max_markdown_bytes: usize) -> Self {
        Self::new(MarkdownRenderer::new(max_markdown_bytes))
    }
}

impl<R: ContentRenderer> Reconciler<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            conversation: Conversation::new(),
            clock: clock_label,
            scroll_requests: 0,
        }
    }

    /// Replace the timestamp-to-clock formatter (local time by default).
    pub fn with_clock(mut self, clock: fn(&str) -> String) -> Self {
        self.clock = clock;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// How many times the view has been asked to scroll to its end. Bumped on
    /// every `reconcile` call, whether or not anything changed.
    pub fn scroll_requests(&self) -> u64 {
        self.scroll_requests
    }

    /// Drop every node. Used once the server has confirmed a history clear.
    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    /// Bring the conversation up to date with `buffer`, the full response text
    /// received so far. Never fails: bad lines are logged and skipped.
    pub fn reconcile(&mut self, buffer: &str) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for line in candidate_lines(buffer) {
            match parse_line(line) {
                Some(ParsedLine::Valid(message)) => self.apply(message, &mut report),
                Some(ParsedLine::Invalid(reason)) => {
                    warn!(%reason, line, "skipping record");
                    report.skipped += 1;
                }
                None => {}
            }
        }

        self.scroll_requests += 1;
        debug!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            nodes = self.conversation.len(),
            "reconciled buffer"
        );
        report
    }

    fn content_html(&self, message: &ChatMessage) -> String {
        if message.literal {
            literal_html(&message.content)
        } else {
            render_or_literal(&self.renderer, &message.content)
        }
    }

    fn apply(&mut self, message: ChatMessage, report: &mut ReconcileReport) {
        let id = node_id(&message.timestamp);

        if self.conversation.get(&id).is_some_and(|n| n.source == message.content) {
            report.unchanged += 1;
            return;
        }
        let content_html = self.content_html(&message);

        if let Some(node) = self.conversation.get_mut(&id) {
            node.content_html = content_html;
            node.source = message.content;
            report.updated += 1;
            report.touch(&id, ChangeKind::Updated);
            return;
        }

        let node = MessageNode {
            content_html,
            clock: (self.clock)(&message.timestamp),
            id: id.clone(),
            role: message.role,
            source: message.content,
        };
        self.conversation.push(node);
        report.created += 1;
        report.touch(&id, ChangeKind::Created);
    }
}
