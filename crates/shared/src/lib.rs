// Public modules
pub mod anthropic;
pub mod calendar;
pub mod completion;
pub mod config;
pub mod data_point;
pub mod document;
pub mod events;
pub mod extractor;
pub mod grok;
pub mod holiday_section;
pub mod holidays;
pub mod io;
pub mod models;
pub mod orchestrator;
pub mod sanitize;
pub mod significance;
pub mod store;
pub mod synthesis;

// Re-export commonly used types
pub use anthropic::ClaudeClient;
pub use completion::{CompletionRequest, CompletionService, GatedCompletion, LlmPolicy, SearchMode};
pub use config::Config;
pub use document::DocumentFormatter;
pub use grok::GrokClient;
pub use holidays::HolidayRegistry;
pub use io::{get_default_briefs_dir, get_default_database_path, load_brief, save_brief};
pub use models::{Locale, WeeklyBriefContent};
pub use orchestrator::BriefOrchestrator;
pub use store::{ArticleStore, SqliteArticleStore};
