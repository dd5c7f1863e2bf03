//! Book search tool.
//!
//! Searches the Google Books volumes API when an API key is configured.
//! Without a key it searches a small built-in catalogue, so book lookups
//! work offline and in tests.
//!
//! Emits one progress frame before the search and completes with the
//! formatted suggestions.

use async_trait::async_trait;
use librarian_core::error::ToolError;
use librarian_core::progress::ToolProgress;
use librarian_core::tool::Tool;
use serde::Deserialize;
use tracing::debug;

const GOOGLE_BOOKS_URL: &str = "https://www.googleapis.com/books/v1/volumes";

/// Default number of suggestions per search.
pub const DEFAULT_MAX_RESULTS: usize = 5;

enum Source {
    GoogleBooks {
        api_key: String,
        client: reqwest::Client,
    },
    Offline,
}

pub struct GoogleBooksTool {
    source: Source,
    max_results: usize,
}

impl GoogleBooksTool {
    /// Live searches through the Google Books API.
    pub fn google_books(api_key: impl Into<String>) -> Self {
        Self {
            source: Source::GoogleBooks {
                api_key: api_key.into(),
                client: reqwest::Client::new(),
            },
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Built-in catalogue, no network.
    pub fn offline() -> Self {
        Self {
            source: Source::Offline,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Cap on suggestions per search, clamped to 1..=20.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, 20);
        self
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.source, Source::Offline)
    }

    async fn search(&self, query: &str) -> Result<Vec<Volume>, ToolError> {
        match &self.source {
            Source::Offline => Ok(offline_search(query, self.max_results)),
            Source::GoogleBooks { api_key, client } => {
                let max_results = self.max_results.to_string();
                let response = client
                    .get(GOOGLE_BOOKS_URL)
                    .query(&[
                        ("q", query),
                        ("maxResults", max_results.as_str()),
                        ("key", api_key.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| failed(format!("request failed: {e}")))?;

                let status = response.status();
                if !status.is_success() {
                    let body: ApiErrorBody = response.json().await.unwrap_or_default();
                    let message = body.error.message.unwrap_or_else(|| "Internal failure".into());
                    return Err(failed(format!(
                        "Unable to retrieve books, got status code {}: {message}",
                        status.as_u16()
                    )));
                }

                let body: VolumesResponse = response
                    .json()
                    .await
                    .map_err(|e| failed(format!("unreadable response: {e}")))?;
                Ok(body.items.into_iter().map(|item| item.volume_info).collect())
            }
        }
    }
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "google_books".into(),
        reason,
    }
}

#[async_trait]
impl Tool for GoogleBooksTool {
    fn name(&self) -> &str {
        "google_books"
    }

    fn description(&self) -> &str {
        "Search Google Books. Useful for general questions about books on a topic \
         and for recommendations based on keywords. Input is a search query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Query to look up on Google Books."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Map<String, serde_json::Value>,
        progress: &ToolProgress,
    ) -> Result<String, ToolError> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let mut metadata = serde_json::Map::new();
        metadata.insert("query".into(), serde_json::json!(query));
        progress.send_progress(format!("Searching books for {query}"), metadata.clone())?;

        debug!(query, offline = self.is_offline(), "Book search");
        let output = render(query, &self.search(query).await?);

        progress.send_complete(Some(output.clone()), metadata)?;
        Ok(output)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    description: Option<String>,
    info_link: Option<String>,
}

#[derive(Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<VolumeItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeItem {
    #[serde(default)]
    volume_info: Volume,
}

#[derive(Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: ApiErrorDetail,
}

#[derive(Default, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

fn render(query: &str, volumes: &[Volume]) -> String {
    if volumes.is_empty() {
        return format!("Sorry no books could be found for your query: {query}");
    }

    let mut sections = vec![format!(
        "Here are {} suggestions for books related to {query}:",
        volumes.len()
    )];
    for (i, volume) in volumes.iter().enumerate() {
        sections.push(format!(
            "{}. \"{}\" by {}: {}\nYou can read more at {}",
            i + 1,
            volume.title.as_deref().unwrap_or("Unknown Title"),
            format_authors(&volume.authors),
            volume.description.as_deref().unwrap_or("No summary available"),
            volume.info_link.as_deref().unwrap_or("No source available"),
        ));
    }
    sections.join("\n\n")
}

fn format_authors(authors: &[String]) -> String {
    match authors {
        [] => "Unknown Author".into(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// (title, authors, description, keywords)
const CATALOGUE: &[(&str, &[&str], &str, &[&str])] = &[
    (
        "The Name of the Rose",
        &["Umberto Eco"],
        "A murder mystery set in a medieval abbey built around a labyrinthine library.",
        &["library", "mystery", "medieval", "novel"],
    ),
    (
        "The Library Book",
        &["Susan Orlean"],
        "The story of the 1986 Los Angeles Central Library fire and of public libraries.",
        &["library", "history", "nonfiction"],
    ),
    (
        "Dream of the Red Chamber",
        &["Cao Xueqin", "Gao E"],
        "The rise and decline of the Jia family, a classic of Chinese literature. (紅樓夢)",
        &["chinese", "classic", "novel", "紅樓夢"],
    ),
    (
        "Structure and Interpretation of Computer Programs",
        &["Harold Abelson", "Gerald Jay Sussman", "Julie Sussman"],
        "Foundational text on programming, abstraction and interpreters.",
        &["programming", "computer", "science", "lisp"],
    ),
    (
        "The Rust Programming Language",
        &["Steve Klabnik", "Carol Nichols"],
        "The official introduction to Rust, ownership and fearless concurrency.",
        &["programming", "rust", "computer"],
    ),
    (
        "A Brief History of Time",
        &["Stephen Hawking"],
        "Cosmology for general readers, from the big bang to black holes.",
        &["science", "physics", "cosmology", "history"],
    ),
    (
        "The Design of Everyday Things",
        &["Don Norman"],
        "How design serves as the communication between object and user.",
        &["design", "psychology", "nonfiction"],
    ),
];

/// Catalogue entries whose title, authors or keywords match any query term.
fn offline_search(query: &str, max_results: usize) -> Vec<Volume> {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();

    CATALOGUE
        .iter()
        .filter(|(title, authors, _, keywords)| {
            let haystack = format!("{} {} {}", title, authors.join(" "), keywords.join(" ")).to_lowercase();
            terms.iter().any(|t| haystack.contains(t.as_str()))
        })
        .take(max_results)
        .map(|(title, authors, description, _)| Volume {
            title: Some((*title).into()),
            authors: authors.iter().map(|a| (*a).to_string()).collect(),
            description: Some((*description).into()),
            info_link: Some(format!(
                "https://books.google.com/books?q={}",
                title.replace(' ', "+")
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use librarian_core::progress::{FrameKind, FrameSink, ToolFrame};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Frames(Mutex<Vec<ToolFrame>>);

    impl FrameSink for Frames {
        fn deliver(&self, frame: ToolFrame) {
            self.0.lock().unwrap().push(frame);
        }
    }

    fn args(query: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("query".into(), serde_json::json!(query));
        map
    }

    fn started(frames: Arc<Frames>) -> ToolProgress {
        let progress = ToolProgress::new("google_books", "call_1", frames);
        progress.start().unwrap();
        progress
    }

    #[tokio::test]
    async fn offline_search_reports_progress_and_completes() {
        let frames = Arc::new(Frames::default());
        let progress = started(frames.clone());
        let output = GoogleBooksTool::offline()
            .execute(args("library"), &progress)
            .await
            .unwrap();

        assert!(output.starts_with("Here are 2 suggestions for books related to library:"));
        assert!(output.contains("1. \"The Name of the Rose\" by Umberto Eco:"));
        assert!(output.contains("You can read more at https://books.google.com/"));

        let frames = frames.0.lock().unwrap();
        let kinds: Vec<_> = frames.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FrameKind::Start, FrameKind::Delta, FrameKind::Completed]);
        assert_eq!(frames[1].tool_tokens.as_deref(), Some("Searching books for library"));
        assert_eq!(frames[2].tool_tokens.as_deref(), Some(output.as_str()));
    }

    #[tokio::test]
    async fn offline_search_matches_cjk_keywords() {
        let output = GoogleBooksTool::offline()
            .execute(args("紅樓夢"), &started(Arc::new(Frames::default())))
            .await
            .unwrap();
        assert!(output.contains("\"Dream of the Red Chamber\" by Cao Xueqin and Gao E"));
    }

    #[tokio::test]
    async fn no_match_is_a_normal_answer() {
        let output = GoogleBooksTool::offline()
            .execute(args("xylophone"), &started(Arc::new(Frames::default())))
            .await
            .unwrap();
        assert_eq!(output, "Sorry no books could be found for your query: xylophone");
    }

    #[tokio::test]
    async fn max_results_caps_suggestions() {
        let output = GoogleBooksTool::offline()
            .with_max_results(1)
            .execute(args("programming"), &started(Arc::new(Frames::default())))
            .await
            .unwrap();
        assert!(output.starts_with("Here are 1 suggestions"));
        assert!(!output.contains("2. "));
    }

    #[tokio::test]
    async fn missing_query_returns_error() {
        let err = GoogleBooksTool::offline()
            .execute(serde_json::Map::new(), &started(Arc::new(Frames::default())))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn authors_formatting() {
        assert_eq!(format_authors(&[]), "Unknown Author");
        assert_eq!(format_authors(&["A".into()]), "A");
        assert_eq!(format_authors(&["A".into(), "B".into(), "C".into()]), "A, B and C");
    }

    #[test]
    fn parses_volumes_payload_with_missing_fields() {
        let body: VolumesResponse = serde_json::from_str(
            r#"{"kind":"books#volumes","totalItems":2,"items":[
                {"volumeInfo":{"title":"Rust in Action","authors":["Tim McNamara"],
                 "infoLink":"https://books.google.com/x"}},
                {"volumeInfo":{}}]}"#,
        )
        .unwrap();
        let volumes: Vec<_> = body.items.into_iter().map(|i| i.volume_info).collect();
        let text = render("rust", &volumes);
        assert!(text.contains("1. \"Rust in Action\" by Tim McNamara: No summary available"));
        assert!(text.contains("2. \"Unknown Title\" by Unknown Author"));
        assert!(text.contains("No source available"));
    }

    #[test]
    fn empty_payload_has_no_items() {
        let body: VolumesResponse = serde_json::from_str(r#"{"kind":"books#volumes","totalItems":0}"#).unwrap();
        assert!(body.items.is_empty());
    }
}
