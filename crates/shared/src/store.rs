use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::models::{Article, Locale};

/// Most articles considered for one weekly brief
pub const WEEK_ARTICLE_LIMIT: usize = 50;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS neighborhoods (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    city TEXT NOT NULL,
    country TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS neighborhood_aliases (
    neighborhood_id TEXT NOT NULL,
    alias_id TEXT NOT NULL,
    PRIMARY KEY (neighborhood_id, alias_id)
);
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY,
    neighborhood_id TEXT NOT NULL,
    headline TEXT NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    category_label TEXT,
    status TEXT NOT NULL DEFAULT 'published',
    published_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_articles_neighborhood_published
    ON articles (neighborhood_id, published_at);
";

pub trait ArticleStore: Send + Sync {
    /// Active locales, ordered by id
    fn locales(&self) -> Result<Vec<Locale>>;

    fn locale(&self, id: &str) -> Result<Option<Locale>>;

    /// Published articles for the locale and its aliases newer than
    /// `since`, newest first, capped at [`WEEK_ARTICLE_LIMIT`]
    fn week_articles(&self, locale: &Locale, since: DateTime<Utc>) -> Result<Vec<Article>>;
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct SqliteArticleStore {
    conn: Mutex<Connection>,
}

impl SqliteArticleStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open article database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialise article database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Article database lock poisoned"))?;
        f(&conn)
    }

    fn aliases(conn: &Connection, id: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT alias_id FROM neighborhood_aliases WHERE neighborhood_id = ?1 ORDER BY alias_id",
        )?;
        let aliases = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(aliases)
    }

    fn row_to_locale(row: &rusqlite::Row<'_>) -> rusqlite::Result<Locale> {
        Ok(Locale::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    }
}

impl ArticleStore for SqliteArticleStore {
    fn locales(&self) -> Result<Vec<Locale>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, city, country FROM neighborhoods WHERE active = 1 ORDER BY id",
            )?;
            let mut locales = stmt
                .query_map([], Self::row_to_locale)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to load neighborhoods")?;
            for locale in &mut locales {
                locale.alias_ids = Self::aliases(conn, &locale.id)?;
            }
            Ok(locales)
        })
    }

    fn locale(&self, id: &str) -> Result<Option<Locale>> {
        self.with_conn(|conn| {
            let locale = conn
                .query_row(
                    "SELECT id, name, city, country FROM neighborhoods WHERE id = ?1",
                    params![id],
                    Self::row_to_locale,
                )
                .optional()
                .with_context(|| format!("Failed to load neighborhood {}", id))?;
            match locale {
                Some(mut locale) => {
                    locale.alias_ids = Self::aliases(conn, &locale.id)?;
                    Ok(Some(locale))
                }
                None => Ok(None),
            }
        })
    }

    fn week_articles(&self, locale: &Locale, since: DateTime<Utc>) -> Result<Vec<Article>> {
        let ids = locale.article_ids();
        let placeholders = (0..ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT headline, body, category_label, published_at FROM articles
             WHERE status = 'published'
               AND julianday(published_at) > julianday(?1)
               AND neighborhood_id IN ({})
             ORDER BY julianday(published_at) DESC
             LIMIT {}",
            placeholders, WEEK_ARTICLE_LIMIT
        );

        let mut values = vec![format_timestamp(since)];
        values.extend(ids.iter().map(|id| id.to_string()));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .with_context(|| format!("Failed to load articles for {}", locale.id))?;

            let mut articles = Vec::with_capacity(rows.len());
            for (headline, body, category_label, published_at) in rows {
                let published_at = DateTime::parse_from_rfc3339(&published_at)
                    .with_context(|| format!("Bad published_at on \"{}\": {}", headline, published_at))?
                    .with_timezone(&Utc);
                articles.push(Article {
                    headline,
                    body,
                    category_label,
                    published_at,
                });
            }
            Ok(articles)
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) fn memory_store() -> SqliteArticleStore {
        SqliteArticleStore::from_connection(Connection::open_in_memory().unwrap()).unwrap()
    }

    pub(crate) fn add_neighborhood(store: &SqliteArticleStore, id: &str, name: &str, city: &str, country: &str) {
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO neighborhoods (id, name, city, country) VALUES (?1, ?2, ?3, ?4)",
                    params![id, name, city, country],
                )?;
                Ok(())
            })
            .unwrap();
    }

    pub(crate) fn add_article(
        store: &SqliteArticleStore,
        neighborhood_id: &str,
        headline: &str,
        status: &str,
        published_at: DateTime<Utc>,
    ) {
        add_article_raw(store, neighborhood_id, headline, status, &format_timestamp(published_at));
    }

    /// Stores `published_at` exactly as given
    pub(crate) fn add_article_raw(
        store: &SqliteArticleStore,
        neighborhood_id: &str,
        headline: &str,
        status: &str,
        published_at: &str,
    ) {
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO articles (neighborhood_id, headline, body, category_label, status, published_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        neighborhood_id,
                        headline,
                        format!("Body of {}", headline),
                        "News",
                        status,
                        published_at
                    ],
                )?;
                Ok(())
            })
            .unwrap();
    }
}
