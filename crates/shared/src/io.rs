use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{Locale, WeeklyBriefContent};

/// Get the default directory for finished briefs
pub fn get_default_briefs_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join("sunday-edition")
        .join("briefs");

    fs::create_dir_all(&data_dir).context("Failed to create briefs directory")?;

    Ok(data_dir)
}

/// Default location of the article database
pub fn get_default_database_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join("sunday-edition");

    fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

    Ok(data_dir.join("articles.db"))
}

pub fn brief_file_stem(locale: &Locale, date: NaiveDate) -> String {
    let slug: String = locale
        .id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{}-{}", slug, date.format("%Y-%m-%d"))
}

/// Write the formatted document and the JSON content side by side
pub fn save_brief(
    dir: &Path,
    locale: &Locale,
    date: NaiveDate,
    content: &WeeklyBriefContent,
    document: &str,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let stem = brief_file_stem(locale, date);
    let text_path = dir.join(format!("{}.txt", stem));
    let json_path = dir.join(format!("{}.json", stem));

    fs::write(&text_path, document)
        .with_context(|| format!("Failed to write brief document: {}", text_path.display()))?;

    let json = serde_json::to_string_pretty(content).context("Failed to serialize brief content")?;
    fs::write(&json_path, json)
        .with_context(|| format!("Failed to write brief JSON: {}", json_path.display()))?;

    Ok((text_path, json_path))
}

/// Load a previously saved brief
pub fn load_brief(path: &Path) -> Result<WeeklyBriefContent> {
    if !path.exists() {
        anyhow::bail!("Brief file not found: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read brief file: {}", path.display()))?;

    serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse brief JSON from {}. The file may be corrupted or not a brief file.",
            path.display()
        )
    })
}
