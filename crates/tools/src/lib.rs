//! Built-in tool implementations for Librarian.
//!
//! Tools give the agent the ability to interact with the world:
//! search for books, read the clock and check the weather.

pub mod date_time;
pub mod google_books;
pub mod weather_lookup;

use librarian_core::tool::ToolRegistry;

pub use date_time::DateTimeTool;
pub use google_books::GoogleBooksTool;
pub use weather_lookup::WeatherLookupTool;

/// Credentials and limits for the built-in tools.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub openweathermap_api_key: Option<String>,
    pub google_books_api_key: Option<String>,
    pub google_books_max_results: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            openweathermap_api_key: None,
            google_books_api_key: None,
            google_books_max_results: google_books::DEFAULT_MAX_RESULTS,
        }
    }
}

/// Create the tool registry with all built-in tools.
///
/// Tools with a configured key go to their live API; the others fall back
/// to offline data.
pub fn default_registry(settings: &ToolSettings) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(DateTimeTool));

    let books = match settings.google_books_api_key.as_deref() {
        Some(key) => GoogleBooksTool::google_books(key),
        None => GoogleBooksTool::offline(),
    };
    registry.register(Box::new(books.with_max_results(settings.google_books_max_results)));

    registry.register(Box::new(match settings.openweathermap_api_key.as_deref() {
        Some(key) => WeatherLookupTool::openweathermap(key),
        None => WeatherLookupTool::offline(),
    }));
    registry
}
