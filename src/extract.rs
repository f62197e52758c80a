//! Text extraction for the documentation site: sitemap XML and HTML pages.
//!
//! Sitemaps are parsed with `quick-xml`. HTML is not well-formed XML in
//! general, so pages go through a small tag scanner instead:
//!
//! - content comes from the first `<main>` element, else `<body>`, else the
//!   whole document;
//! - `<script>`, `<style>`, `<noscript>` and comments are dropped;
//! - block-level tags become line breaks, other tags are removed;
//! - common entities are decoded;
//! - whitespace inside a line collapses to one space and runs of blank lines
//!   collapse to one.

use quick_xml::events::Event;

/// Extraction error. Malformed input is an error, never a panic.
#[derive(Debug)]
pub enum ExtractError {
    Sitemap(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Sitemap(e) => write!(f, "sitemap parsing failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Whether a sitemap lists pages or further sitemaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapKind {
    UrlSet,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sitemap {
    pub kind: SitemapKind,
    /// `<loc>` values in document order.
    pub locs: Vec<String>,
}

pub fn parse_sitemap(xml: &str) -> Result<Sitemap, ExtractError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut kind = None;
    let mut locs = Vec::new();
    let mut in_loc = false;
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"urlset" if kind.is_none() => kind = Some(SitemapKind::UrlSet),
                b"sitemapindex" if kind.is_none() => kind = Some(SitemapKind::Index),
                b"loc" => {
                    in_loc = true;
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_loc => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::Sitemap(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::CData(c)) if in_loc => {
                current.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"loc" => {
                in_loc = false;
                let loc = current.trim();
                if !loc.is_empty() {
                    locs.push(loc.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Sitemap(e.to_string())),
            _ => {}
        }
    }

    let kind = kind.ok_or_else(|| {
        ExtractError::Sitemap("neither <urlset> nor <sitemapindex> found".to_string())
    })?;
    Ok(Sitemap { kind, locs })
}

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "td", "th", "tr", "ul",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript"];

/// Text of the page's `<title>`, whitespace-collapsed. Empty when absent.
pub fn html_title(html: &str) -> String {
    match element_inner(html, "title") {
        Some(inner) => collapse_spaces(&decode_entities(inner)),
        None => String::new(),
    }
}

/// Visible text of the page's main content.
pub fn html_text(html: &str) -> String {
    let region = element_inner(html, "main")
        .or_else(|| element_inner(html, "body"))
        .unwrap_or(html);

    let mut raw = String::with_capacity(region.len());
    let lower = region.to_ascii_lowercase();
    let mut pos = 0;

    while pos < region.len() {
        let Some(rel) = region[pos..].find('<') else {
            raw.push_str(&region[pos..]);
            break;
        };
        raw.push_str(&region[pos..pos + rel]);
        let tag_start = pos + rel;

        if lower[tag_start..].starts_with("<!--") {
            pos = match lower[tag_start..].find("-->") {
                Some(end) => tag_start + end + 3,
                None => region.len(),
            };
            continue;
        }

        let Some(tag_len) = region[tag_start..].find('>') else {
            break;
        };
        let tag_end = tag_start + tag_len + 1;
        let (name, closing) = tag_name(&lower[tag_start + 1..tag_end - 1]);

        if !closing && SKIPPED_TAGS.contains(&name) {
            let close = format!("</{}", name);
            pos = match lower[tag_end..].find(&close) {
                Some(c) => {
                    let after = tag_end + c;
                    lower[after..]
                        .find('>')
                        .map(|g| after + g + 1)
                        .unwrap_or(region.len())
                }
                None => region.len(),
            };
            continue;
        }

        if BLOCK_TAGS.contains(&name) {
            raw.push('\n');
        }
        pos = tag_end;
    }

    normalize_lines(&decode_entities(&raw))
}

/// Inner text of the first `<tag ...>...</tag>`, ASCII case-insensitive.
fn element_inner<'a>(html: &'a str, tag: &str) -> Option<&'a str> {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let mut search = 0;
    while let Some(rel) = lower[search..].find(&open) {
        let start = search + rel;
        let after = start + open.len();
        // Reject prefixes such as <mainframe> for <main>.
        let boundary = lower[after..]
            .chars()
            .next()
            .map(|c| c == '>' || c == '/' || c.is_ascii_whitespace())
            .unwrap_or(false);
        if boundary {
            let content_start = after + lower[after..].find('>')? + 1;
            let close = format!("</{}", tag);
            let content_end = lower[content_start..]
                .find(&close)
                .map(|e| content_start + e)
                .unwrap_or(html.len());
            return Some(&html[content_start..content_end]);
        }
        search = after;
    }
    None
}

/// Lower-cased tag name and whether it is a closing tag.
fn tag_name(inner: &str) -> (&str, bool) {
    let inner = inner.trim_start();
    let (closing, rest) = match inner.strip_prefix('/') {
        Some(r) => (true, r),
        None => (false, inner),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    (&rest[..end], closing)
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "ndash" => Some('–'),
        "mdash" => Some('—'),
        "hellip" => Some('…'),
        "rsquo" => Some('\''),
        "lsquo" => Some('\''),
        "rdquo" => Some('"'),
        "ldquo" => Some('"'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_lines(s: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in s.lines() {
        let line = collapse_spaces(line);
        if line.is_empty() && lines.last().map(|l| l.is_empty()).unwrap_or(true) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn urlset_locs_in_order() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://docs.example.com/</loc></url>
  <url><loc>https://docs.example.com/setup?a=1&amp;b=2</loc><lastmod>2024-01-01</lastmod></url>
</urlset>"#;
        let sitemap = parse_sitemap(xml).unwrap();
        assert_eq!(sitemap.kind, SitemapKind::UrlSet);
        assert_eq!(
            sitemap.locs,
            vec![
                "https://docs.example.com/".to_string(),
                "https://docs.example.com/setup?a=1&b=2".to_string()
            ]
        );
    }

    #[test]
    fn sitemap_index_detected() {
        let xml = r#"<sitemapindex><sitemap><loc>https://d/sitemap-pages.xml</loc></sitemap></sitemapindex>"#;
        let sitemap = parse_sitemap(xml).unwrap();
        assert_eq!(sitemap.kind, SitemapKind::Index);
        assert_eq!(sitemap.locs, vec!["https://d/sitemap-pages.xml".to_string()]);
    }

    #[test]
    fn non_sitemap_is_error() {
        assert!(parse_sitemap("<html><body>nope</body></html>").is_err());
        assert!(parse_sitemap("<urlset><url><loc>x</url>").is_err());
    }

    #[test]
    fn main_preferred_over_body() {
        let html = r#"<html><head><title> ION &amp; Docs </title>
<style>.x { color: red }</style></head>
<body><nav>Menu</nav>
<main class="page"><h1>Work orders</h1><p>Create a <b>work order</b> from the
dashboard.</p><script>var x = "<p>";</script><!-- hidden --><ul><li>One</li><li>Two</li></ul></main>
<footer>Footer</footer></body></html>"#;
        assert_eq!(html_title(html), "ION & Docs");
        assert_eq!(
            html_text(html),
            "Work orders\n\nCreate a work order from the\ndashboard.\n\nOne\n\nTwo"
        );
    }

    #[test]
    fn body_fallback_and_mainframe_not_main() {
        let html = "<html><body><mainframe>x</mainframe><div>Body text</div></body></html>";
        assert_eq!(html_text(html), "x\nBody text");
    }

    #[test]
    fn fragment_without_body() {
        assert_eq!(html_text("plain &lt;text&gt; &#65;&#x42;"), "plain <text> AB");
        assert_eq!(html_title("<p>no title</p>"), "");
    }

    #[test]
    fn unknown_entities_kept() {
        assert_eq!(decode_entities("R&D &bogus; a & b"), "R&D &bogus; a & b");
    }
}
