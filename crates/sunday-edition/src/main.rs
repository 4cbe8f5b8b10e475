use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use futures::stream::{self, StreamExt};
use shared::{
    get_default_briefs_dir, get_default_database_path, load_brief, save_brief, ArticleStore,
    BriefOrchestrator, ClaudeClient, CompletionService, Config, DocumentFormatter, GrokClient,
    HolidayRegistry, Locale, SqliteArticleStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sunday-edition")]
#[command(about = "Generate the weekly Sunday Edition brief for each neighborhood")]
struct Args {
    /// Neighborhood id to generate (repeatable)
    #[arg(short, long = "locale", value_name = "ID")]
    locales: Vec<String>,

    /// Generate for every active neighborhood
    #[arg(short, long, conflicts_with = "locales")]
    all: bool,

    /// Generate as if today were this date (YYYY-MM-DD)
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Number of neighborhoods processed at once
    #[arg(short, long, default_value = "1")]
    parallel: usize,

    /// Directory for the finished briefs
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also print each document to stdout
    #[arg(long)]
    print: bool,

    /// List active neighborhoods and exit
    #[arg(long)]
    list: bool,

    /// Print the document for a saved brief JSON file and exit
    #[arg(long, value_name = "BRIEF_JSON")]
    render: Option<PathBuf>,
}

fn reference_time(date: Option<NaiveDate>) -> Result<DateTime<Utc>> {
    match date {
        Some(date) => Ok(date
            .and_hms_opt(12, 0, 0)
            .context("Invalid --date")?
            .and_utc()),
        None => Ok(Utc::now()),
    }
}

fn render(path: &Path) -> Result<()> {
    let content = load_brief(path)?;
    println!("{}", DocumentFormatter::format(&content));
    Ok(())
}

fn resolve_locales(store: &dyn ArticleStore, args: &Args) -> Result<Vec<Locale>> {
    if args.all {
        return store.locales().context("Failed to list neighborhoods");
    }

    let mut locales = Vec::new();
    for id in &args.locales {
        match store.locale(id)? {
            Some(locale) => locales.push(locale),
            None => println!("⚠ Unknown neighborhood: {} (skipping)", id),
        }
    }
    Ok(locales)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let args = Args::parse();

    if let Some(path) = &args.render {
        return render(path);
    }

    if !args.all && !args.list && args.locales.is_empty() {
        anyhow::bail!("Nothing to do. Pass --locale <ID> (repeatable), --all, --list or --render <BRIEF_JSON>");
    }

    let config = Config::from_env()?;

    let db_path = match &config.database_path {
        Some(path) => path.clone(),
        None => get_default_database_path()?,
    };
    let store: Arc<dyn ArticleStore> = Arc::new(SqliteArticleStore::open(&db_path)?);
    info!("Using article database {}", db_path.display());

    if args.list {
        let locales = store.locales().context("Failed to list neighborhoods")?;
        for locale in &locales {
            println!("{:<24} {}", locale.id, locale.display_name());
        }
        println!("\n{} active neighborhoods", locales.len());
        return Ok(());
    }

    let locales = resolve_locales(store.as_ref(), &args)?;
    if locales.is_empty() {
        println!("No neighborhoods to process.");
        return Ok(());
    }

    let now = reference_time(args.date)?;
    let today = now.date_naive();
    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => get_default_briefs_dir()?,
    };

    let primary: Arc<dyn CompletionService> = Arc::new(ClaudeClient::new(
        config.anthropic_api_key.clone(),
        config.anthropic_model.clone(),
    )?);
    let social: Option<Arc<dyn CompletionService>> = match &config.xai_api_key {
        Some(key) => Some(Arc::new(GrokClient::new(key.clone(), config.xai_model.clone())?)),
        None => {
            println!("⚠ XAI_API_KEY not set, events will come from web search only");
            None
        }
    };
    let registry = Arc::new(HolidayRegistry::default());

    println!(
        "\n📰 Generating the Sunday Edition for {} neighborhood(s), week of {}",
        locales.len(),
        today.format("%B %-d, %Y")
    );

    let parallel = args.parallel.max(1);
    let briefs = stream::iter(locales.into_iter().map(|locale| {
        let orchestrator = BriefOrchestrator::new(
            store.clone(),
            primary.clone(),
            social.clone(),
            registry.clone(),
            &config.llm_policy,
        );
        async move {
            let content = orchestrator.generate(&locale, now).await;
            (locale, content)
        }
    }))
    .buffer_unordered(parallel);
    let mut briefs = std::pin::pin!(briefs);

    let mut written = 0;
    while let Some((locale, content)) = briefs.next().await {
        let document = DocumentFormatter::format(&content);
        let (text_path, _) = save_brief(&output_dir, &locale, today, &content, &document)
            .with_context(|| format!("Failed to save brief for {}", locale.id))?;
        written += 1;

        if content.rearview_stories.is_empty() {
            warn!("{} had no significant stories this week", locale.id);
        }
        println!(
            "✓ {} ({} stories, {} events) -> {}",
            locale.display_name(),
            content.rearview_stories.len(),
            content.horizon_events.len(),
            text_path.display()
        );

        if args.print {
            println!("\n{}\n", document);
        }
    }

    println!("\n✅ {} brief(s) saved to: {}", written, output_dir.display());

    Ok(())
}
