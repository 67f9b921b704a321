//! Loading policy documents from a directory.
//!
//! The loader only cares about "file in, raw text out". HTML pages are
//! reduced to their visible text; everything else is read as-is.

use std::path::{Path, PathBuf};

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;

/// Elements whose content is never policy text.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "header", "footer", "noscript"];

/// A policy document reduced to plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// File the document was read from.
    pub path: PathBuf,

    /// Human-readable label derived from the file name.
    pub label: String,

    /// Extracted text.
    pub text: String,
}

/// Reads every supported file in a directory.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    dir: PathBuf,
    extensions: Vec<String>,
    label_prefix: Option<String>,
    max_depth: usize,
}

impl DocumentLoader {
    /// Create a loader for `dir` accepting html, htm, txt and md files.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extensions: Vec::from(["html", "htm", "txt", "md"].map(String::from)),
            label_prefix: None,
            max_depth: 1,
        }
    }

    /// Replace the accepted file extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.into().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Strip `prefix` from file stems before building labels.
    pub fn with_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.label_prefix = Some(prefix.into());
        self
    }

    /// Set how deep to recurse (1 = only the directory itself).
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Load all documents, sorted by path.
    ///
    /// A missing directory is not an error: it yields no documents.
    pub fn load(&self) -> Result<Vec<Document>> {
        if !self.dir.is_dir() {
            warn!("Document directory {} does not exist", self.dir.display());
            return Ok(Vec::new());
        }

        let extractor = HtmlTextExtractor::new()?;
        let mut documents = Vec::new();

        for entry in WalkDir::new(&self.dir)
            .max_depth(self.max_depth)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(ext) = self.accepted_extension(path) else {
                debug!("Skipping unsupported file {}", path.display());
                continue;
            };

            let raw = std::fs::read(path)?;
            let raw = String::from_utf8_lossy(&raw);
            let text = if ext == "html" || ext == "htm" {
                extractor.extract(&raw)
            } else {
                raw.replace("\r\n", "\n")
            };

            let label = label_for(path, self.label_prefix.as_deref());
            debug!("Loaded {} ({} chars) as {label}", path.display(), text.len());
            documents.push(Document {
                path: path.to_path_buf(),
                label,
                text,
            });
        }

        info!(
            "Found {} documents in {}",
            documents.len(),
            self.dir.display()
        );
        Ok(documents)
    }

    fn accepted_extension(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        self.extensions.contains(&ext).then_some(ext)
    }
}

/// Reduces an HTML page to its visible text.
pub struct HtmlTextExtractor {
    skipped: Vec<Regex>,
    comments: Regex,
    block_tags: Regex,
    tags: Regex,
}

impl HtmlTextExtractor {
    /// Compile the extraction patterns.
    pub fn new() -> Result<Self> {
        let skipped = SKIPPED_ELEMENTS
            .iter()
            .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            skipped,
            comments: Regex::new(r"(?s)<!--.*?-->")?,
            block_tags: Regex::new(
                r"(?i)</?(p|div|br|li|ul|ol|h[1-6]|tr|table|section|article|main|dd|dt|blockquote)\b[^>]*>",
            )?,
            tags: Regex::new(r"<[^>]*>")?,
        })
    }

    /// Extract visible text, one paragraph per block element.
    pub fn extract(&self, html: &str) -> String {
        let mut text = self.comments.replace_all(html, "").into_owned();
        for pattern in &self.skipped {
            text = pattern.replace_all(&text, "").into_owned();
        }
        let text = self.block_tags.replace_all(&text, "\n\n");
        let text = self.tags.replace_all(&text, "");
        normalize_whitespace(&html_escape::decode_html_entities(&text))
    }
}

/// Collapse runs of whitespace inside lines and runs of blank lines into a
/// single paragraph break.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_break = false;

    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            pending_break = !out.is_empty();
            continue;
        }
        if pending_break {
            out.push_str("\n\n");
        } else if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&line);
        pending_break = false;
    }

    out
}

/// Build a title-cased label from a file stem.
fn label_for(path: &Path, prefix: Option<&str>) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = prefix
        .and_then(|p| stem.strip_prefix(p))
        .unwrap_or(&stem);

    let label = stem
        .split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");

    if label.is_empty() {
        "Document".to_string()
    } else {
        label
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_extract_drops_scripts_and_navigation() {
        let extractor = HtmlTextExtractor::new().unwrap();
        let html = r#"<html><head><style>p { color: red; }</style>
            <script type="text/javascript">var fee = 1;</script></head>
            <body><nav><a href="/">Home</a></nav>
            <header>Site header</header>
            <h1>Baggage FAQs</h1>
            <p>Your first checked bag costs $35 &amp; your second costs more.</p>
            <!-- tracking pixel -->
            <footer>Copyright</footer></body></html>"#;

        let text = extractor.extract(html);
        assert!(text.contains("Baggage FAQs"));
        assert!(text.contains("costs $35 & your second"));
        assert!(!text.contains("var fee"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("Home"));
        assert!(!text.contains("Site header"));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("tracking"));
    }

    #[test]
    fn test_extract_decodes_numeric_and_named_entities() {
        let extractor = HtmlTextExtractor::new().unwrap();
        let text = extractor.extract(
            "<p>Bags cost &#36;35 &#8212; see Delta&#8217;s caf&eacute;&nbsp;rules &lt;here&gt;</p>",
        );
        assert_eq!(text, "Bags cost $35 \u{2014} see Delta\u{2019}s caf\u{e9} rules <here>");
    }

    #[test]
    fn test_extract_separates_blocks_into_paragraphs() {
        let extractor = HtmlTextExtractor::new().unwrap();
        let text = extractor.extract("<div>First   block</div><div>Second <b>bold</b> block</div>");
        assert_eq!(text, "First block\n\nSecond bold block");
    }

    #[test]
    fn test_label_for_file_names() {
        assert_eq!(
            label_for(Path::new("data/delta_baggage_faqs.html"), Some("delta_")),
            "Baggage Faqs"
        );
        assert_eq!(
            label_for(Path::new("data/carry-on_RULES.txt"), None),
            "Carry On Rules"
        );
        assert_eq!(label_for(Path::new("data/_.txt"), None), "Document");
    }

    #[test]
    fn test_load_reads_supported_files_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("b_contract.html"),
            "<p>Checked bags over 50 pounds incur an overweight charge.</p>",
        )
        .unwrap();
        std::fs::write(dir.path().join("a_faq.txt"), "Pets travel in the cabin.\r\nLine two.").unwrap();
        std::fs::write(dir.path().join("ignored.pdf"), "binary").unwrap();

        let documents = DocumentLoader::new(dir.path()).load().unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].label, "A Faq");
        assert_eq!(documents[0].text, "Pets travel in the cabin.\nLine two.");
        assert_eq!(documents[1].label, "B Contract");
        assert_eq!(
            documents[1].text,
            "Checked bags over 50 pounds incur an overweight charge."
        );
    }

    #[test]
    fn test_max_depth_controls_recursion() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/deep_rules.txt"), "Deep text.").unwrap();
        std::fs::write(dir.path().join("top.txt"), "Top text.").unwrap();

        let shallow = DocumentLoader::new(dir.path()).load().unwrap();
        assert_eq!(shallow.len(), 1);
        assert_eq!(shallow[0].label, "Top");

        let deep = DocumentLoader::new(dir.path()).with_max_depth(2).load().unwrap();
        let labels: Vec<_> = deep.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["Deep Rules", "Top"]);
    }

    #[test]
    fn test_load_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let documents = DocumentLoader::new(dir.path().join("missing")).load().unwrap();
        assert!(documents.is_empty());
    }

    #[test]
    fn test_custom_extensions() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("policy.txt"), "text").unwrap();
        std::fs::write(dir.path().join("policy.md"), "markdown").unwrap();

        let documents = DocumentLoader::new(dir.path())
            .with_extensions([".MD"])
            .load()
            .unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].text, "markdown");
    }
}
