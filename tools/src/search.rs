use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use crew_core::{Tool, ToolError};
use regex::Regex;
use tracing::{debug, warn};

pub const NAME: &str = "grant_search";
const DESCRIPTION: &str = "Search the web for currently open grant funding opportunities. \
                           Input is a plain-language query such as 'NGO clean water access'.";

const ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const MAX_QUERY_CHARS: usize = 400;
const MAX_RESULTS: usize = 8;

/// Anything that turns a query into raw result text.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn search(&self, query: &str) -> Result<String, ToolError>;
}

/// `grant_search`: appends "<year> grant funding opportunity" to the query and
/// returns what the search engine found.
pub struct GrantSearch<E> {
    engine: E,
    year: i32,
}

impl<E: SearchEngine> GrantSearch<E> {
    pub fn new(engine: E, year: i32) -> Self {
        Self { engine, year }
    }
}

#[async_trait]
impl<E: SearchEngine> Tool for GrantSearch<E> {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn call(&self, input: &str) -> Result<String, ToolError> {
        let query = qualified_query(input, self.year);
        debug!(query = %query, "searching for grants");
        self.engine.search(&query).await
    }
}

/// Normalises the agent's text into a single-line query and adds the fixed
/// qualifier. Control characters become spaces and overly long input is cut.
pub fn qualified_query(input: &str, year: i32) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_QUERY_CHARS)
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.is_empty() {
        format!("{year} grant funding opportunity")
    } else {
        format!("{} {year} grant funding opportunity", words.join(" "))
    }
}

/// DuckDuckGo's HTML endpoint.
pub struct DuckDuckGo {
    client: reqwest::Client,
}

impl DuckDuckGo {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("grant-crew/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(20))
            .build();
        Self {
            client: client_or_default(client),
        }
    }
}

/// Falls back to reqwest's defaults (no request timeout) when the tuned
/// client cannot be built.
fn client_or_default(built: reqwest::Result<reqwest::Client>) -> reqwest::Client {
    built.unwrap_or_else(|e| {
        warn!(error = %e, "search client misconfigured, using defaults");
        reqwest::Client::new()
    })
}

impl Default for DuckDuckGo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchEngine for DuckDuckGo {
    async fn search(&self, query: &str) -> Result<String, ToolError> {
        let response = self
            .client
            .get(ENDPOINT)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Response(format!("search returned HTTP {status}")));
        }
        let html = response
            .text()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let hits = parse_results(&html);
        debug!(hits = hits.len(), "search finished");
        Ok(render(query, &hits))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
            .expect("valid regex")
    })
}

fn snippet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#).expect("valid regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"))
}

/// Each result's snippet is looked up only between its own title anchor and
/// the next one.
pub fn parse_results(html: &str) -> Vec<SearchHit> {
    let titles: Vec<_> = title_re().captures_iter(html).take(MAX_RESULTS).collect();

    titles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let start = c.get(0).map_or(0, |m| m.end());
            let end = titles
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(html.len(), |m| m.start());
            let snippet = snippet_re()
                .captures(&html[start..end])
                .map(|s| clean_text(&s[1]))
                .unwrap_or_default();
            SearchHit {
                title: clean_text(&c[2]),
                link: resolve_link(&decode_entities(&c[1])),
                snippet,
            }
        })
        .collect()
}

pub fn render(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No search results found for \"{query}\".");
    }
    let mut out = format!("Search results for \"{query}\":\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n   Link: {}\n", i + 1, hit.title, hit.link));
        if !hit.snippet.is_empty() {
            out.push_str(&format!("   {}\n", hit.snippet));
        }
    }
    out
}

/// Result links point at a DuckDuckGo redirect; the target sits in `uddg`.
fn resolve_link(href: &str) -> String {
    let target = href
        .split(['?', '&'])
        .find_map(|part| part.strip_prefix("uddg="))
        .and_then(|encoded| urlencoding::decode(encoded).ok())
        .map(|decoded| decoded.into_owned());
    match target {
        Some(url) => url,
        None if href.starts_with("//") => format!("https:{href}"),
        None => href.to_string(),
    }
}

fn clean_text(fragment: &str) -> String {
    let stripped = tag_re().replace_all(fragment, "");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result results_links results_links_deep web-result ">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.example.org%2Fwater%2Dfund&amp;rut=abc">Clean <b>Water</b> Fund &amp; Partners</a>
  </h2>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">Grants of <b>$10,000</b>&#x27;s
     for NGOs.</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://direct.example.com/apply">Direct Link</a>
</div>
"#;

    struct Echo;

    #[async_trait]
    impl SearchEngine for Echo {
        async fn search(&self, query: &str) -> Result<String, ToolError> {
            Ok(format!("searched: {query}"))
        }
    }

    struct Offline;

    #[async_trait]
    impl SearchEngine for Offline {
        async fn search(&self, _query: &str) -> Result<String, ToolError> {
            Err(ToolError::Transport("dns error".to_string()))
        }
    }

    #[test]
    fn test_qualifier_is_appended() {
        assert_eq!(
            qualified_query("NGO clean water", 2026),
            "NGO clean water 2026 grant funding opportunity"
        );
    }

    #[test]
    fn test_empty_and_odd_input_still_make_a_query() {
        assert_eq!(qualified_query("", 2026), "2026 grant funding opportunity");
        assert_eq!(
            qualified_query("a\u{0}b\n\tc", 2026),
            "a b c 2026 grant funding opportunity"
        );
        let long = "x".repeat(100_000);
        let query = qualified_query(&long, 2026);
        assert!(query.len() < MAX_QUERY_CHARS + 40);
    }

    #[test]
    fn test_parse_results() {
        let hits = parse_results(PAGE);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Clean Water Fund & Partners");
        assert_eq!(hits[0].link, "https://www.example.org/water-fund");
        assert_eq!(hits[0].snippet, "Grants of $10,000's for NGOs.");
        assert_eq!(hits[1].link, "https://direct.example.com/apply");
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn test_snippet_stays_with_its_own_result() {
        let page = r#"
<div class="result"><a class="result__a" href="https://alpha.example.org">Alpha</a></div>
<div class="result"><a class="result__a" href="https://beta.example.org">Beta</a>
  <a class="result__snippet" href="https://beta.example.org">Beta gives 50k to NGOs.</a>
</div>
"#;
        let hits = parse_results(page);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Alpha");
        assert_eq!(hits[0].snippet, "");
        assert_eq!(hits[1].title, "Beta");
        assert_eq!(hits[1].snippet, "Beta gives 50k to NGOs.");
    }

    #[test]
    fn test_client_build_failure_falls_back() {
        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        let client = client_or_default(Err(err));
        assert!(client.get(ENDPOINT).build().is_ok());
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render("q", &[]), "No search results found for \"q\".");
    }

    #[test]
    fn test_render_lists_hits() {
        let text = render("q", &parse_results(PAGE));
        assert!(text.contains("1. Clean Water Fund & Partners"));
        assert!(text.contains("Link: https://www.example.org/water-fund"));
        assert!(text.contains("2. Direct Link"));
    }

    #[tokio::test]
    async fn test_tool_passes_qualified_query() {
        let tool = GrantSearch::new(Echo, 2026);
        assert_eq!(
            tool.call("startup AI").await.unwrap(),
            "searched: startup AI 2026 grant funding opportunity"
        );
    }

    #[tokio::test]
    async fn test_offline_search_is_text_through_registry() {
        let mut registry = crew_core::Registry::new();
        registry.register(GrantSearch::new(Offline, 2026)).unwrap();
        let out = registry.invoke(NAME, "anything").await;
        assert!(out.contains("dns error"));
    }
}
