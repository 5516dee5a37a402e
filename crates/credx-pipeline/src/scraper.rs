//! Article fetching, ownership verification, and text cleanup.
//!
//! Publishers prove ownership by serving a `credx-verification` meta tag
//! whose content matches the code issued when the site was registered.
//! Only verified pages are cleaned and passed on to the classifier.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::PipelineError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36";

static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<meta\b[^>]*>").expect("valid regex"));
static META_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)name\s*=\s*["']credx-verification["']"#).expect("valid regex")
});
static META_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)content\s*=\s*["']([^"']*)["']"#).expect("valid regex"));

/// Fetches article pages over HTTP.
pub struct Scraper {
    client: reqwest::Client,
}

impl Scraper {
    pub fn new() -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch the raw HTML of an article page.
    pub async fn fetch(&self, url: &str) -> Result<String, PipelineError> {
        info!(url, "fetching article");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(url, status = status.as_u16(), "article fetch failed");
            return Err(PipelineError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.text().await?)
    }
}

/// Check the page's `credx-verification` meta tag against the expected
/// code. Attribute order within the tag does not matter.
pub fn verify(html: &str, code: &str) -> bool {
    for tag in META_TAG_RE.find_iter(html) {
        let tag = tag.as_str();
        if !META_NAME_RE.is_match(tag) {
            continue;
        }
        if let Some(cap) = META_CONTENT_RE.captures(tag) {
            if &cap[1] == code {
                info!("article verification succeeded");
                return true;
            }
        }
    }
    info!("article verification failed");
    false
}

/// Strip markup down to readable article text.
///
/// Drops script/style/template blocks and HTML comments, turns block
/// boundaries into newlines, removes the remaining tags, decodes common
/// entities, and collapses blank lines.
pub fn clean(html: &str) -> String {
    // One pattern per container since the regex crate has no backreferences.
    static DROP_BLOCK_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
        [
            "script", "style", "nav", "footer", "header", "aside", "form", "iframe", "noscript",
        ]
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b.*?</{tag}\s*>")).expect("valid regex")
        })
        .collect()
    });
    static COMMENT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
    static BLOCK_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)</?(p|div|br|h1|h2|h3|h4|li|tr)\b[^>]*>").expect("valid regex")
    });
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

    let mut text = html.to_string();
    for re in DROP_BLOCK_RES.iter() {
        text = re.replace_all(&text, "").into_owned();
    }
    let text = COMMENT_RE.replace_all(&text, "");
    let text = BLOCK_BREAK_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");
    let text = decode_entities(&text);

    // Trim each line and drop the empty ones.
    let cleaned: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    cleaned.join("\n")
}

/// Deterministic, filesystem-safe identifier for an article URL.
pub fn article_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_matches_code() {
        let html = r#"<html><head>
            <meta name="credx-verification" content="secret-123">
        </head><body></body></html>"#;
        assert!(verify(html, "secret-123"));
        assert!(!verify(html, "wrong-code"));
    }

    #[test]
    fn verify_handles_reversed_attribute_order() {
        let html = r#"<meta content="abc" name="credx-verification" />"#;
        assert!(verify(html, "abc"));
    }

    #[test]
    fn verify_ignores_other_meta_tags() {
        let html = r#"<meta name="description" content="secret-123">"#;
        assert!(!verify(html, "secret-123"));
    }

    #[test]
    fn clean_strips_scripts_and_styles() {
        let html = r#"<html><body>
            <script>var x = 1;</script>
            <style>.ad { color: red; }</style>
            <article><p>First paragraph.</p><p>Second paragraph.</p></article>
        </body></html>"#;
        let text = clean(html);
        assert!(text.contains("First paragraph."));
        assert!(text.contains("Second paragraph."));
        assert!(!text.contains("var x"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn clean_breaks_on_block_tags() {
        let text = clean("<h1>Title</h1><p>Body text.</p>");
        assert_eq!(text, "Title\nBody text.");
    }

    #[test]
    fn clean_removes_comments_and_decodes_entities() {
        let text = clean("<p>Fish &amp; chips <!-- hidden --> &quot;daily&quot;</p>");
        assert_eq!(text, "Fish & chips \"daily\"");
    }

    #[test]
    fn clean_drops_boilerplate_sections() {
        let html = r#"
            <nav>Home | About</nav>
            <article><p>The story.</p></article>
            <footer>Copyright 2026</footer>
        "#;
        let text = clean(html);
        assert_eq!(text, "The story.");
    }

    #[test]
    fn article_id_is_deterministic_hex() {
        let a = article_id("https://example.com/post");
        let b = article_id("https://example.com/post");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, article_id("https://example.com/other"));
    }
}
