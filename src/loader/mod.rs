
use std::path::Path;
use std::time::Duration;

use scraper::Html;
use tracing::{debug, warn};
use url::Url;

use crate::{RagError, Result};

const WEB_FETCH_TIMEOUT_SECONDS: u64 = 30;

/// Source tag used for web page ingestion
pub const WEB_SOURCE: &str = "web";

/// A loaded document before chunking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub text: String,
    /// Logical origin identifier (filename or "web")
    pub source: String,
    /// 0-based page number for paginated sources
    pub page: Option<u32>,
}

/// A document source dispatched through one loading interface
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// PDF file contents
    Pdf { content: Vec<u8>, source: String },
    /// Web page to fetch and reduce to text
    Web(Url),
    /// Caller-supplied text
    Raw { text: String, source: String },
}

impl DocumentSource {
    /// Dispatch a file by extension. Unrecognized extensions fail with
    /// `UnsupportedFormat`, naming the offending extension.
    #[inline]
    pub fn from_file(filename: &str, content: Vec<u8>) -> Result<Self> {
        match file_extension(filename).as_deref() {
            Some("pdf") => Ok(Self::Pdf {
                content,
                source: filename.to_string(),
            }),
            Some("txt" | "md") => {
                let text = String::from_utf8(content).map_err(|_| {
                    RagError::Loader(format!("{} is not valid UTF-8", filename))
                })?;
                Ok(Self::Raw {
                    text,
                    source: filename.to_string(),
                })
            }
            Some(other) => Err(RagError::UnsupportedFormat(format!(".{}", other))),
            None => Err(RagError::UnsupportedFormat(format!(
                "no extension ({})",
                filename
            ))),
        }
    }

    /// Load the source into a uniform document representation.
    ///
    /// PDFs load one document per non-empty page; the other kinds load a
    /// single document.
    #[inline]
    pub fn load(&self) -> Result<Vec<RawDocument>> {
        match self {
            Self::Pdf { content, source } => {
                let pages = load_pdf_pages(content, source)?;
                Ok(pages
                    .map(|(page, text)| RawDocument {
                        text,
                        source: source.clone(),
                        page: Some(page),
                    })
                    .collect())
            }
            Self::Web(url) => Ok(vec![fetch_web(url)?]),
            Self::Raw { text, source } => Ok(vec![RawDocument {
                text: text.clone(),
                source: source.clone(),
                page: None,
            }]),
        }
    }

    /// Whether ingestion should stream page-by-page instead of batching
    #[inline]
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Pdf { .. })
    }
}

/// Iterator over `(page_number, page_text)` pairs of a PDF, skipping
/// whitespace-only pages. Page numbers are 0-based.
#[derive(Debug)]
pub struct PdfPages {
    pages: std::vec::IntoIter<(u32, String)>,
}

impl Iterator for PdfPages {
    type Item = (u32, String);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.pages.next()
    }
}

/// Parse a PDF and expose its pages for one-page-at-a-time ingestion.
///
/// The document is parsed once up front; downstream chunking, embedding, and
/// storage then proceed strictly per page so only one page's chunks are in
/// flight at a time.
#[inline]
pub fn load_pdf_pages(content: &[u8], source: &str) -> Result<PdfPages> {
    let page_texts = pdf_extract::extract_text_from_mem_by_pages(content)
        .map_err(|e| RagError::Loader(format!("Failed to parse PDF {}: {}", source, e)))?;

    let total = page_texts.len();
    let pages: Vec<(u32, String)> = page_texts
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| (i as u32, text))
        .collect();

    if pages.len() < total {
        warn!(
            "Skipped {} empty page(s) in {}",
            total - pages.len(),
            source
        );
    }

    debug!("Loaded {} page(s) from {}", pages.len(), source);

    Ok(PdfPages {
        pages: pages.into_iter(),
    })
}

/// Fetch a web page and reduce it to plain text
#[inline]
pub fn fetch_web(url: &Url) -> Result<RawDocument> {
    debug!("Fetching web page: {}", url);

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(WEB_FETCH_TIMEOUT_SECONDS)))
        .build()
        .into();

    let html = agent
        .get(url.as_str())
        .call()
        .and_then(|mut resp| resp.body_mut().read_to_string())
        .map_err(|e| RagError::Network(format!("Failed to fetch {}: {}", url, e)))?;

    let text = html_to_text(&html);

    if text.trim().is_empty() {
        return Err(RagError::Loader(format!(
            "No text content extracted from {}",
            url
        )));
    }

    Ok(RawDocument {
        text,
        source: WEB_SOURCE.to_string(),
        page: None,
    })
}

/// Reduce an HTML document to whitespace-normalized text, ignoring script and
/// style content
pub(crate) fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut text = String::new();
    for node in document.root_element().descendants() {
        if let Some(fragment) = node.value().as_text() {
            // Skip text living inside script/style subtrees
            let in_ignored = node.ancestors().any(|ancestor| {
                scraper::ElementRef::wrap(ancestor).is_some_and(|el| {
                    matches!(el.value().name(), "script" | "style" | "noscript")
                })
            });
            if in_ignored {
                continue;
            }

            let trimmed = fragment.trim();
            if !trimmed.is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(trimmed);
            }
        }
    }

    text
}

fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}
