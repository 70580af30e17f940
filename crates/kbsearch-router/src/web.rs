use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use kbsearch_core::config::HttpConfig;
use kbsearch_core::http::client;
use kbsearch_core::{Provenance, Result, SearchResult, WebSearch};
use kbsearch_vector::record::clip;

const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com/";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; kbsearch/0.1)";
const SOURCE: &str = "DuckDuckGo";
const TITLE_CHARS: usize = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default, rename = "AbstractText")]
    abstract_text: String,
    #[serde(default, rename = "Abstract")]
    abstract_html: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Topic groups (`{"Name", "Topics"}`) have neither field and are skipped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RelatedTopic {
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
}

/// DuckDuckGo instant-answer client. Never fails: on any error, or when the
/// API has nothing to say, it returns a single link to the search page.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(http: &HttpConfig) -> Result<Self> {
        Ok(Self { client: client(http.request_timeout)?, endpoint: DEFAULT_ENDPOINT.to_string() })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch(&self, query: &str) -> std::result::Result<String, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[("q", query), ("format", "json"), ("no_html", "1"), ("skip_disambig", "1")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

fn web_result(id: String, title: String, content: String, url: Option<String>, provenance: Provenance) -> SearchResult {
    SearchResult {
        id,
        title,
        content,
        source: SOURCE.to_string(),
        url,
        page_number: None,
        similarity_score: None,
        relevance_score: None,
        provenance,
    }
}

/// Related topics first, then the abstract if there is still room.
pub fn parse_instant_answer(body: &str, query: &str, k: usize) -> Vec<SearchResult> {
    let answer: InstantAnswer = serde_json::from_str(body).unwrap_or_default();
    let mut results: Vec<SearchResult> = answer
        .related_topics
        .into_iter()
        .take(k)
        .filter_map(|t| match (t.text, t.first_url) {
            (Some(text), Some(url)) => Some((text, url)),
            _ => None,
        })
        .map(|(text, url)| web_result(url.clone(), clip(&text, TITLE_CHARS), text, Some(url), Provenance::Real))
        .collect();

    let abstract_text = if answer.abstract_text.is_empty() { answer.abstract_html } else { answer.abstract_text };
    if results.len() < k && !abstract_text.is_empty() {
        let title = if answer.heading.is_empty() { query.to_string() } else { answer.heading };
        let url = Some(answer.abstract_url).filter(|u| !u.is_empty());
        let id = url.clone().unwrap_or_else(|| format!("ddg-abstract-{query}"));
        results.push(web_result(id, title, abstract_text, url, Provenance::Real));
    }
    results
}

/// Link to the results page, used when the API returns nothing usable.
pub fn search_page_link(query: &str) -> SearchResult {
    let url = Url::parse_with_params("https://duckduckgo.com/", &[("q", query)])
        .map(String::from)
        .unwrap_or_else(|_| "https://duckduckgo.com/".to_string());
    web_result(
        url.clone(),
        format!("Search results for: {query}"),
        format!("Please search for '{query}' to find relevant information."),
        Some(url),
        Provenance::Fallback,
    )
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, k: usize) -> Vec<SearchResult> {
        if k == 0 {
            return Vec::new();
        }
        let mut results = match self.fetch(query).await {
            Ok(body) => parse_instant_answer(&body, query, k),
            Err(e) => {
                warn!(error = %e, "duckduckgo request failed");
                Vec::new()
            }
        };
        if results.is_empty() {
            results.push(search_page_link(query));
        }
        results.truncate(k);
        debug!(hits = results.len(), "web search");
        results
    }
}
