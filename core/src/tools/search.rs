use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use super::Tool;
use super::ToolError;
use super::WEB_SEARCH;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Web search over the DuckDuckGo Instant Answer API.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    http: Client,
    base_url: String,
    max_results: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub text: String,
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InstantAnswer {
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    answer: Value,
    definition: String,
    #[serde(rename = "DefinitionURL")]
    definition_url: String,
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RelatedTopic {
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
    topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
struct Args {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

impl DuckDuckGoSearch {
    pub fn new(base_url: &str, max_results: usize) -> Result<Self, ToolError> {
        let http = Client::builder().timeout(SEARCH_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: max_results.max(1),
        })
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ToolError> {
        let response = self
            .http
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Status {
                status: status.as_u16(),
            });
        }

        // The API answers with a javascript content type, so decode by hand.
        let body = response.text().await?;
        let answer: InstantAnswer = serde_json::from_str(&body)
            .map_err(|e| ToolError::InvalidResponse(e.to_string()))?;
        Ok(collect_hits(answer, limit))
    }
}

fn collect_hits(answer: InstantAnswer, limit: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    let non_empty = |url: String| (!url.is_empty()).then_some(url);

    match &answer.answer {
        Value::String(text) if !text.trim().is_empty() => hits.push(SearchHit {
            text: text.trim().to_string(),
            url: None,
        }),
        _ => {}
    }
    if !answer.abstract_text.trim().is_empty() {
        hits.push(SearchHit {
            text: answer.abstract_text.trim().to_string(),
            url: non_empty(answer.abstract_url),
        });
    }
    if !answer.definition.trim().is_empty() {
        hits.push(SearchHit {
            text: answer.definition.trim().to_string(),
            url: non_empty(answer.definition_url),
        });
    }

    let mut pending: Vec<RelatedTopic> = answer.related_topics.into_iter().rev().collect();
    while let Some(topic) = pending.pop() {
        if hits.len() >= limit {
            break;
        }
        if let Some(text) = topic.text.filter(|t| !t.trim().is_empty()) {
            hits.push(SearchHit {
                text: text.trim().to_string(),
                url: topic.first_url.and_then(non_empty),
            });
        }
        pending.extend(topic.topics.into_iter().rev());
    }

    hits.truncate(limit);
    hits
}

fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No good search result found for \"{query}\".");
    }
    let mut out = format!("Search results for \"{query}\":\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!("{}. {}", i + 1, hit.text));
        if let Some(url) = &hit.url {
            out.push_str(&format!(" ({url})"));
        }
        out.push('\n');
    }
    out
}

#[async_trait]
impl Tool for DuckDuckGoSearch {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns short summaries with source links."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: Args = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("query is empty".to_string()));
        }
        let limit = args
            .max_results
            .unwrap_or(self.max_results)
            .clamp(1, self.max_results);

        tracing::debug!(query, limit, "web search");
        let hits = self.search(query, limit).await?;
        Ok(format_hits(query, &hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hits_flatten_nested_topics_in_order() {
        let answer: InstantAnswer = serde_json::from_value(json!({
            "AbstractText": "Terraform is an IaC tool.",
            "AbstractURL": "https://example.com/terraform",
            "Answer": "",
            "Definition": "",
            "RelatedTopics": [
                {"Text": "HCL", "FirstURL": "https://example.com/hcl"},
                {"Name": "Providers", "Topics": [
                    {"Text": "AWS provider", "FirstURL": ""},
                    {"Text": "GCP provider"}
                ]},
                {"Text": "State"}
            ]
        }))
        .unwrap();
        let hits = collect_hits(answer, 4);
        let texts: Vec<_> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Terraform is an IaC tool.", "HCL", "AWS provider", "GCP provider"]
        );
        assert_eq!(hits[2].url, None);
    }

    #[test]
    fn empty_answer_formats_as_no_results() {
        let hits = collect_hits(InstantAnswer::default(), 3);
        assert_eq!(format_hits("nothing", &hits), "No good search result found for \"nothing\".");
    }

    #[tokio::test]
    async fn rejects_missing_query() {
        let tool = DuckDuckGoSearch::new("http://127.0.0.1:9", 3).unwrap();
        let err = tool.call(json!({"q": "x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
