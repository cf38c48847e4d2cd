//! Web search probe
//!
//! Scrapes the HTML result pages of one or more search engines. A failing
//! engine is skipped; results gathered from the others are still returned.

use eyre::{Context, Result};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

use super::{Capability, CapabilityResult};
use crate::config::{SearchEngine, WebSearchConfig};
use crate::directive::{Command, Verb};
use crate::error::ProtocolError;

/// One search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// A source of search results
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Result-page layout of a search engine
struct PageLayout {
    url: &'static str,
    count_param: &'static str,
    result: &'static str,
    title: &'static str,
    link: &'static str,
}

fn layout(engine: SearchEngine) -> PageLayout {
    match engine {
        SearchEngine::DuckDuckGo => PageLayout {
            url: "https://html.duckduckgo.com/html/",
            count_param: "",
            result: ".result",
            title: ".result__a",
            link: ".result__a",
        },
        SearchEngine::Bing => PageLayout {
            url: "https://www.bing.com/search",
            count_param: "count",
            result: "li.b_algo",
            title: "h2",
            link: "h2 a",
        },
        SearchEngine::Google => PageLayout {
            url: "https://www.google.com/search",
            count_param: "num",
            result: "div.g",
            title: "h3",
            link: "a[href]",
        },
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| eyre::eyre!("Failed to parse selector {}: {:?}", css, e))
}

/// Extract up to `limit` hits from a result page
pub fn parse_results(engine: SearchEngine, html: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let layout = layout(engine);
    let result_sel = selector(layout.result)?;
    let title_sel = selector(layout.title)?;
    let link_sel = selector(layout.link)?;

    let document = Html::parse_document(html);
    let mut hits = Vec::new();

    for result in document.select(&result_sel) {
        if hits.len() >= limit {
            break;
        }

        let title = result
            .select(&title_sel)
            .next()
            .map(|e| e.text().collect::<String>())
            .unwrap_or_default();
        let url = result
            .select(&link_sel)
            .next()
            .and_then(|e| e.value().attr("href"))
            .unwrap_or("");

        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() || url.is_empty() {
            continue;
        }

        let url = if url.starts_with("//") { format!("https:{}", url) } else { url.to_string() };
        hits.push(SearchHit {
            title,
            url: unwrap_redirect(&url),
        });
    }

    Ok(hits)
}

/// Target of a DuckDuckGo `/l/?uddg=<url>` redirect; other links pass through
fn unwrap_redirect(link: &str) -> String {
    let Ok(parsed) = Url::parse(link) else {
        return link.to_string();
    };
    if parsed.path() != "/l/" || !parsed.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) {
        return link.to_string();
    }

    parsed
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, target)| target.into_owned())
        .filter(|target| !target.is_empty())
        .unwrap_or_else(|| link.to_string())
}

/// Scraping backend for one engine
pub struct HtmlSearchBackend {
    engine: SearchEngine,
    agent: ureq::Agent,
    user_agent: String,
}

impl HtmlSearchBackend {
    pub fn new(engine: SearchEngine, request_timeout: Duration, user_agent: &str) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(request_timeout))
            .build();

        Self {
            engine,
            agent: ureq::Agent::new_with_config(config),
            user_agent: user_agent.to_string(),
        }
    }
}

impl SearchBackend for HtmlSearchBackend {
    fn name(&self) -> &str {
        self.engine.as_str()
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let layout = layout(self.engine);
        let mut request = self
            .agent
            .get(layout.url)
            .query("q", query)
            .header("User-Agent", &self.user_agent);
        if !layout.count_param.is_empty() {
            request = request.query(layout.count_param, limit.to_string());
        }

        let mut response = request
            .call()
            .with_context(|| format!("{} request failed", self.name()))?;
        let html = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("Failed to read {} response", self.name()))?;

        parse_results(self.engine, &html, limit)
    }
}

/// `WEBSEARCH`: `title - url` lines from every backend
pub struct WebSearchProbe {
    backends: Vec<Box<dyn SearchBackend>>,
    max_results: usize,
}

impl WebSearchProbe {
    pub fn new(backends: Vec<Box<dyn SearchBackend>>, max_results: usize) -> Self {
        Self { backends, max_results }
    }

    pub fn from_config(config: &WebSearchConfig) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let backends = config
            .backends
            .iter()
            .map(|engine| {
                Box::new(HtmlSearchBackend::new(*engine, timeout, &config.user_agent)) as Box<dyn SearchBackend>
            })
            .collect();
        Self::new(backends, config.max_results)
    }

    pub fn search(&self, query: &str) -> CapabilityResult {
        let mut lines = Vec::new();
        let mut errors = Vec::new();

        for backend in &self.backends {
            match backend.search(query, self.max_results) {
                Ok(hits) => {
                    log::debug!("{} returned {} results for {:?}", backend.name(), hits.len(), query);
                    lines.extend(
                        hits.into_iter()
                            .take(self.max_results)
                            .map(|hit| format!("{} - {}", hit.title, hit.url)),
                    );
                }
                Err(e) => {
                    log::warn!("{} search failed: {:#}", backend.name(), e);
                    errors.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        if !lines.is_empty() {
            return CapabilityResult::from_lines(lines, true);
        }

        let message = format!("No results found for: {}", query);
        if !errors.is_empty() && errors.len() == self.backends.len() {
            CapabilityResult::failure(format!("{} ({})", message, errors.join("; ")))
        } else {
            CapabilityResult::success(message)
        }
    }
}

impl Capability for WebSearchProbe {
    fn verb(&self) -> Verb {
        Verb::WebSearch
    }

    fn execute(&self, command: Command) -> CapabilityResult {
        match command {
            Command::WebSearch { query } => self.search(&query),
            other => ProtocolError::HandlerFault {
                verb: Verb::WebSearch,
                message: format!("cannot handle {}", other.verb()),
            }
            .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, Vec<(&'static str, &'static str)>);

    impl SearchBackend for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>> {
            Ok(self
                .1
                .iter()
                .take(limit)
                .map(|(title, url)| SearchHit {
                    title: title.to_string(),
                    url: url.to_string(),
                })
                .collect())
        }
    }

    struct Broken(&'static str);

    impl SearchBackend for Broken {
        fn name(&self) -> &str {
            self.0
        }

        fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            eyre::bail!("connection refused")
        }
    }

    #[test]
    fn test_parse_duckduckgo_page() {
        let html = r#"
            <div class="result">
              <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2Flearn%3Fa%3D1&amp;rut=abc">The Rust
                 Programming Language</a></h2>
            </div>
            <div class="result"><a class="result__a" href="https://doc.rust-lang.org/book/">The Book</a></div>
            <div class="result"><span>no link here</span></div>
        "#;

        let hits = parse_results(SearchEngine::DuckDuckGo, html, 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "The Rust Programming Language");
        assert_eq!(hits[0].url, "https://www.rust-lang.org/learn?a=1");
        assert_eq!(hits[1].url, "https://doc.rust-lang.org/book/");
    }

    #[test]
    fn test_unwrap_redirect_leaves_plain_links() {
        assert_eq!(unwrap_redirect("https://example.com/l/?uddg=x"), "https://example.com/l/?uddg=x");
        assert_eq!(unwrap_redirect("https://duckduckgo.com/l/"), "https://duckduckgo.com/l/");
        assert_eq!(unwrap_redirect("/relative"), "/relative");
    }

    #[test]
    fn test_parse_bing_page_respects_limit() {
        let html = r#"
            <ol>
              <li class="b_algo"><h2><a href="https://a.example">A</a></h2></li>
              <li class="b_algo"><h2><a href="https://b.example">B</a></h2></li>
              <li class="b_algo"><h2><a href="https://c.example">C</a></h2></li>
            </ol>
        "#;

        let hits = parse_results(SearchEngine::Bing, html, 2).unwrap();
        assert_eq!(
            hits,
            vec![
                SearchHit {
                    title: "A".into(),
                    url: "https://a.example".into()
                },
                SearchHit {
                    title: "B".into(),
                    url: "https://b.example".into()
                },
            ]
        );
    }

    #[test]
    fn test_results_from_every_backend() {
        let probe = WebSearchProbe::new(
            vec![
                Box::new(Fixed("one", vec![("Tokio", "https://tokio.rs")])),
                Box::new(Fixed("two", vec![("Ureq", "https://docs.rs/ureq")])),
            ],
            5,
        );

        let result = probe.search("rust http");
        assert!(result.ok);
        assert_eq!(result.text, "Tokio - https://tokio.rs\nUreq - https://docs.rs/ureq");
    }

    #[test]
    fn test_failed_backend_keeps_other_results() {
        let probe = WebSearchProbe::new(
            vec![
                Box::new(Broken("down")),
                Box::new(Fixed("up", vec![("Serde", "https://serde.rs")])),
            ],
            5,
        );

        let result = probe.search("serde");
        assert!(result.ok);
        assert_eq!(result.text, "Serde - https://serde.rs");
    }

    #[test]
    fn test_no_results_message() {
        let probe = WebSearchProbe::new(vec![Box::new(Fixed("empty", vec![]))], 5);
        let result = probe.search("zzzz");
        assert!(result.ok);
        assert_eq!(result.text, "No results found for: zzzz");
    }

    #[test]
    fn test_all_backends_failing_is_a_failure() {
        let probe = WebSearchProbe::new(vec![Box::new(Broken("a")), Box::new(Broken("b"))], 5);
        let result = probe.search("q");
        assert!(!result.ok);
        assert!(result.text.starts_with("No results found for: q ("));
        assert!(result.text.contains("a: connection refused"));
    }

    #[test]
    fn test_results_capped_per_backend() {
        let probe = WebSearchProbe::new(
            vec![Box::new(Fixed(
                "many",
                vec![("1", "u1"), ("2", "u2"), ("3", "u3")],
            ))],
            2,
        );
        assert_eq!(probe.search("q").text, "1 - u1\n2 - u2");
    }
}
