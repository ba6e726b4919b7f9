//! Render a conversation to HTML and store it beside the messages.

use pulldown_cmark::{html, Options, Parser};
use tracing::info;

use super::Conversation;
use crate::error::{ConverseError, ConverseResult};
use crate::session::Session;
use crate::types::DirEntry;

/// Name of the rendered output inside a conversation directory.
pub const INDEX_FILE: &str = "index.html";

/// Turns an assembled thread into a document.
pub trait Renderer {
    fn render(&self, conv: &Conversation) -> ConverseResult<Vec<u8>>;
}

/// Markdown-to-HTML renderer. Each message becomes a section headed by its
/// author, time and position.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    /// The intermediate markdown document.
    pub fn markdown(&self, conv: &Conversation) -> String {
        let mut doc = String::new();
        for (i, message) in conv.messages().iter().enumerate() {
            doc.push_str(&format!(
                "\n------------- *{} on {} (msg {})* -------------\n\n{}\n",
                message.author,
                message.time.format("%a %b %e %H:%M:%S %Z %Y"),
                i + 1,
                message.content_text()
            ));
        }
        doc
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, conv: &Conversation) -> ConverseResult<Vec<u8>> {
        let markdown = self.markdown(conv);
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let mut out = String::new();
        html::push_html(&mut out, Parser::new_ext(&markdown, options));
        Ok(out.into_bytes())
    }
}

/// Render `conv` and write it to `index.html` in its directory.
///
/// An empty conversation is rejected before anything is written.
pub fn publish(
    session: &Session,
    conv: &Conversation,
    renderer: &dyn Renderer,
) -> ConverseResult<DirEntry> {
    let location = conv.location().ok_or(ConverseError::UntitledConversation)?;
    if conv.is_empty() {
        return Err(ConverseError::EmptyConversation(location.to_string()));
    }

    let html = renderer.render(conv)?;
    let entry = session.store().put(&location.join(INDEX_FILE), &html)?;
    info!(path = %entry.name, size = entry.size, "Published conversation");
    Ok(entry)
}
