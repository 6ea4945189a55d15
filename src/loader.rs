//! Document loaders: local text files and web pages.
//!
//! Loaders produce [`Document`]s whose `page_content` is fed to templates as
//! an ordinary variable:
//!
//! ```no_run
//! use llm_runnables::loader::{Loader, TextLoader};
//! use serde_json::json;
//!
//! # async fn run() -> llm_runnables::Result<()> {
//! let docs = TextLoader::new("ai_poem.txt").load().await?;
//! let input = json!({"poem": docs[0].page_content});
//! # Ok(())
//! # }
//! ```

use crate::backend::send_text;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// A unit of loaded content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    /// Always carries `source`; web pages add `title` when present.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("source".into(), Value::String(source.into()));
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// A source of documents.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self) -> Result<Vec<Document>>;
}

/// Loads one UTF-8 text file as a single document.
#[derive(Debug, Clone)]
pub struct TextLoader {
    path: PathBuf,
}

impl TextLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Loader for TextLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        tracing::debug!(path = %self.path.display(), bytes = content.len(), "loaded text file");
        Ok(vec![Document::new(content, self.path.display().to_string())])
    }
}

/// Fetches a web page and reduces its HTML to visible text.
#[derive(Debug, Clone)]
pub struct WebLoader {
    url: String,
    client: Client,
}

impl WebLoader {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
        }
    }

    /// Reuse an existing HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl Loader for WebLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let html = send_text(self.client.get(&self.url)).await?;
        let mut doc = Document::new(html_to_text(&html), self.url.clone());
        if let Some(title) = html_title(&html) {
            doc.metadata.insert("title".into(), Value::String(title));
        }
        tracing::debug!(url = %self.url, chars = doc.page_content.len(), "loaded web page");
        Ok(vec![doc])
    }
}

/// Elements whose content is never visible text.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Reduce an HTML document to its visible text.
///
/// Drops comments, tags and the content of script-like elements, decodes
/// common entities and collapses whitespace runs to single spaces.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let lower = html.to_ascii_lowercase();
    let mut i = 0;

    while i < html.len() {
        let rest = &html[i..];
        let Some(lt) = rest.find('<') else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..lt]);
        i += lt;

        if lower[i..].starts_with("<!--") {
            i = match lower[i..].find("-->") {
                Some(end) => i + end + 3,
                None => html.len(),
            };
            continue;
        }

        let tag_end = match html[i..].find('>') {
            Some(end) => i + end + 1,
            None => break,
        };
        let name = tag_name(&lower[i..tag_end]);
        i = tag_end;

        if HIDDEN_ELEMENTS.contains(&name) {
            let close = format!("</{}", name);
            i = match lower[i..].find(&close) {
                Some(start) => match lower[i + start..].find('>') {
                    Some(end) => i + start + end + 1,
                    None => html.len(),
                },
                None => html.len(),
            };
        } else {
            // Tags separate words.
            out.push(' ');
        }
    }

    collapse_whitespace(&decode_entities(&out))
}

fn tag_name(tag: &str) -> &str {
    let body = tag.trim_start_matches('<').trim_start_matches('/');
    let end = body
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(body.len());
    &body[..end]
}

fn html_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title")?;
    let title = collapse_whitespace(&decode_entities(&html[start..end]));
    (!title.is_empty()).then_some(title)
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
