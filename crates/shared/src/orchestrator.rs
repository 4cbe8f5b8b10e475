use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::completion::{CompletionService, GatedCompletion, LlmPolicy};
use crate::data_point::DataPointGenerator;
use crate::events::{sort_events, EventCurator, EventHunter, EventQuery, MAX_EVENTS};
use crate::holiday_section::HolidaySectionBuilder;
use crate::holidays::HolidayRegistry;
use crate::models::{Article, Locale, WeeklyBriefContent};
use crate::sanitize::sanitize_headline;
use crate::significance::{SignificanceFilter, MAX_STORIES};
use crate::store::ArticleStore;
use crate::synthesis::EditorialSynthesizer;

/// Stages a brief passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchWeekArticles,
    FilterSignificance,
    SynthesizeNarrative,
    HuntEvents,
    CurateEvents,
    FallbackTierB,
    SortEvents,
    DetectHoliday,
    GenerateDataPoint,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Builds one locale's weekly brief. Every stage degrades to an empty or
/// placeholder result, so `generate` always returns content.
pub struct BriefOrchestrator {
    store: Arc<dyn ArticleStore>,
    filter: SignificanceFilter,
    synthesizer: EditorialSynthesizer,
    hunter: EventHunter,
    curator: EventCurator,
    data_points: DataPointGenerator,
    holidays: HolidaySectionBuilder,
}

impl BriefOrchestrator {
    /// All model calls made through this orchestrator share one
    /// concurrency gate sized by `policy`.
    pub fn new(
        store: Arc<dyn ArticleStore>,
        primary: Arc<dyn CompletionService>,
        social: Option<Arc<dyn CompletionService>>,
        registry: Arc<HolidayRegistry>,
        policy: &LlmPolicy,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(policy.max_concurrent_calls.max(1)));

        let primary: Arc<dyn CompletionService> =
            Arc::new(GatedCompletion::new(primary, semaphore.clone(), policy));
        let social = social.map(|service| {
            Arc::new(GatedCompletion::new(service, semaphore.clone(), policy)) as Arc<dyn CompletionService>
        });

        Self {
            store,
            filter: SignificanceFilter::new(primary.clone()),
            synthesizer: EditorialSynthesizer::new(primary.clone()),
            hunter: EventHunter::new(social),
            curator: EventCurator::new(primary.clone()),
            data_points: DataPointGenerator::new(primary),
            holidays: HolidaySectionBuilder::new(registry),
        }
    }

    pub async fn generate(&self, locale: &Locale, now: DateTime<Utc>) -> WeeklyBriefContent {
        let today = now.date_naive();
        info!("Generating Sunday Edition for {} ({})", locale.display_name(), today);

        enter(locale, Stage::FetchWeekArticles);
        let articles = self.fetch_week_articles(locale, now);
        let headlines = unique_headlines(&articles);
        debug!("{} articles, {} distinct headlines for {}", articles.len(), headlines.len(), locale.id);

        enter(locale, Stage::FilterSignificance);
        let stories = self.filter.select(locale, &headlines).await;

        enter(locale, Stage::SynthesizeNarrative);
        let narrative = self.synthesizer.synthesize(locale, &stories, &articles).await;

        let query = EventQuery::horizon(today);
        enter(locale, Stage::HuntEvents);
        let mut events = if self.hunter.is_configured() {
            match self.hunter.hunt(locale, &query).await {
                Some(raw) => {
                    enter(locale, Stage::CurateEvents);
                    self.curator.curate(locale, &query, &raw).await
                }
                None => Vec::new(),
            }
        } else {
            info!("Tier A search not configured, {} goes straight to Tier B", locale.id);
            Vec::new()
        };
        if events.is_empty() {
            enter(locale, Stage::FallbackTierB);
            events = self.curator.search_and_curate(locale, &query).await;
        }

        enter(locale, Stage::SortEvents);
        sort_events(&mut events, today);

        enter(locale, Stage::DetectHoliday);
        let holiday_section = self.holidays.build(locale, today, &self.hunter, &self.curator).await;

        enter(locale, Stage::GenerateDataPoint);
        let data_point = self.data_points.generate(locale, today).await;

        enter(locale, Stage::Assemble);
        let mut rearview_stories = stories;
        rearview_stories.truncate(MAX_STORIES);
        events.truncate(MAX_EVENTS);

        let content = WeeklyBriefContent {
            rearview_narrative: narrative,
            rearview_stories,
            horizon_events: events,
            data_point,
            holiday_section,
        }
        .sanitized();

        info!(
            "Brief ready for {}: {} stories, {} events, holiday={}, data point={}",
            locale.id,
            content.rearview_stories.len(),
            content.horizon_events.len(),
            content
                .holiday_section
                .as_ref()
                .map(|s| s.holiday_name.as_str())
                .unwrap_or("none"),
            content.data_point.label
        );
        content
    }

    fn fetch_week_articles(&self, locale: &Locale, now: DateTime<Utc>) -> Vec<Article> {
        match self.store.week_articles(locale, now - Duration::days(7)) {
            Ok(articles) => articles,
            Err(e) => {
                error!("Failed to fetch articles for {}: {:#}", locale.id, e);
                Vec::new()
            }
        }
    }
}

fn enter(locale: &Locale, stage: Stage) {
    debug!("Stage {} - locale={}", stage, locale.id);
}

/// Sanitized, non-empty headlines in store order with repeats removed
fn unique_headlines(articles: &[Article]) -> Vec<String> {
    let mut headlines: Vec<String> = Vec::new();
    for article in articles {
        let headline = sanitize_headline(&article.headline);
        if !headline.is_empty() && !headlines.contains(&headline) {
            headlines.push(headline);
        }
    }
    headlines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::ScriptedCompletion;
    use crate::data_point::DATA_UNAVAILABLE;
    use crate::store::testing::{add_article, add_neighborhood, memory_store};
    use crate::synthesis::quiet_week_narrative;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;

    fn policy() -> LlmPolicy {
        LlmPolicy {
            max_concurrent_calls: 1,
            timeout: StdDuration::from_secs(5),
            max_attempts: 1,
        }
    }

    // Wednesday of ISO week 42; no holiday within a week for the US
    fn october_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
    }

    fn orchestrator(
        store: Arc<dyn ArticleStore>,
        primary: Arc<ScriptedCompletion>,
        social: Option<Arc<ScriptedCompletion>>,
    ) -> BriefOrchestrator {
        BriefOrchestrator::new(
            store,
            primary,
            social.map(|s| s as Arc<dyn CompletionService>),
            Arc::new(HolidayRegistry::default()),
            &policy(),
        )
    }

    const DATA_POINT_REPLY: &str = r#"{"value": "AQI 38 (Good)", "context": "Clear skies all week."}"#;

    const TIER_B_REPLY: &str = r#"{"events": [
      {"day": "Sat Oct 17, 7:30 PM", "name": "Late opening at the Drawing Center", "whyItMatters": "Free after six.", "category": "culture"},
      {"day": "Thu Oct 15, 6:00 PM", "name": "Chef pop-up on Franklin Street", "whyItMatters": "One night only.", "category": "dining"}
    ]}"#;

    struct BrokenStore;

    impl ArticleStore for BrokenStore {
        fn locales(&self) -> anyhow::Result<Vec<Locale>> {
            anyhow::bail!("database is locked")
        }

        fn locale(&self, _id: &str) -> anyhow::Result<Option<Locale>> {
            anyhow::bail!("database is locked")
        }

        fn week_articles(&self, _locale: &Locale, _since: DateTime<Utc>) -> anyhow::Result<Vec<Article>> {
            anyhow::bail!("database is locked")
        }
    }

    #[test]
    fn test_unique_headlines_sanitizes_and_dedupes() {
        let article = |headline: &str| Article {
            headline: headline.to_string(),
            body: String::new(),
            category_label: None,
            published_at: october_now(),
        };
        let articles = vec![
            article("[News] Pier 26 reopens"),
            article("Pier 26 reopens"),
            article("   "),
            article("Rents climb \u{2014} again"),
        ];
        assert_eq!(
            unique_headlines(&articles),
            vec!["Pier 26 reopens".to_string(), "Rents climb - again".to_string()]
        );
    }

    #[tokio::test]
    async fn test_quiet_week_skips_story_calls() {
        let store = memory_store();
        add_neighborhood(&store, "tribeca", "Tribeca", "New York", "USA");
        let store: Arc<dyn ArticleStore> = Arc::new(store);
        let locale = store.locale("tribeca").unwrap().unwrap();

        let primary = ScriptedCompletion::new("claude")
            .reply(r#"{"events": []}"#)
            .reply(DATA_POINT_REPLY);
        let brief = orchestrator(store, primary.clone(), None)
            .generate(&locale, october_now())
            .await;

        assert_eq!(brief.rearview_narrative, quiet_week_narrative(&locale));
        assert!(brief.rearview_stories.is_empty());
        assert!(brief.horizon_events.is_empty());
        assert!(brief.holiday_section.is_none());
        assert_eq!(brief.data_point.value, "AQI 38 (Good)");
        // Tier B search and the data point only
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_full_week_with_tier_b_fallback() {
        let store = memory_store();
        add_neighborhood(&store, "tribeca", "Tribeca", "New York", "USA");
        let now = october_now();
        add_article(&store, "tribeca", "Pier 26 reopens after two-year rebuild", "published", now - Duration::days(2));
        add_article(&store, "tribeca", "[Real Estate] Penthouse on Franklin Street sells for record", "published", now - Duration::days(3));
        add_article(&store, "tribeca", "Draft about nothing", "draft", now - Duration::days(1));
        let store: Arc<dyn ArticleStore> = Arc::new(store);
        let locale = store.locale("tribeca").unwrap().unwrap();

        let social = ScriptedCompletion::new("grok").reply("Nothing much is happening.");
        let primary = ScriptedCompletion::new("claude")
            .reply(
                r#"{"stories": [
                  {"headline": "Penthouse on Franklin Street sells for record", "significance": "Resets the top of the market."},
                  {"headline": "Pier 26 reopens after two-year rebuild", "significance": "The waterfront is back \u2014 finally."}
                ]}"#,
            )
            .reply("The week belonged to the waterfront \u{2014} and to money.")
            .reply(r#"{"events": []}"#)
            .reply(TIER_B_REPLY)
            .reply(DATA_POINT_REPLY);

        let brief = orchestrator(store, primary.clone(), Some(social.clone()))
            .generate(&locale, now)
            .await;

        assert_eq!(social.calls(), 1);
        assert_eq!(primary.calls(), 5);

        let headlines: Vec<_> = brief.rearview_stories.iter().map(|s| s.headline.as_str()).collect();
        assert_eq!(
            headlines,
            vec!["Penthouse on Franklin Street sells for record", "Pier 26 reopens after two-year rebuild"]
        );
        assert_eq!(brief.rearview_stories[1].significance, "The waterfront is back - finally.");
        assert_eq!(brief.rearview_narrative, "The week belonged to the waterfront - and to money.");

        // Tier B results only, in chronological order
        let names: Vec<_> = brief.horizon_events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Chef pop-up on Franklin Street", "Late opening at the Drawing Center"]);

        // The synthesis prompt carries the draft-free source text
        let synthesis_prompt = &primary.requests()[1].prompt;
        assert!(synthesis_prompt.contains("Body of Pier 26 reopens"));
        assert!(!synthesis_prompt.contains("Draft about nothing"));
    }

    #[tokio::test]
    async fn test_tier_a_results_are_used_when_present() {
        let store = memory_store();
        add_neighborhood(&store, "tribeca", "Tribeca", "New York", "USA");
        let store: Arc<dyn ArticleStore> = Arc::new(store);
        let locale = store.locale("tribeca").unwrap().unwrap();

        let social = ScriptedCompletion::new("grok").reply("Gallery talk Friday 19:00 at Apexart.");
        let primary = ScriptedCompletion::new("claude")
            .reply(
                r#"{"events": [{"day": "Fri Oct 16, 19:00", "name": "Gallery talk at Apexart", "whyItMatters": "Curator-led.", "category": "culture"}]}"#,
            )
            .reply(DATA_POINT_REPLY);

        let brief = orchestrator(store, primary.clone(), Some(social))
            .generate(&locale, october_now())
            .await;

        assert_eq!(primary.calls(), 2);
        assert_eq!(brief.horizon_events.len(), 1);
        assert_eq!(brief.horizon_events[0].day, "Fri Oct 16, 7:00 PM");
    }

    #[tokio::test]
    async fn test_japan_holiday_week() {
        let store = memory_store();
        add_neighborhood(&store, "daikanyama", "Daikanyama", "Tokyo", "Japan");
        let store: Arc<dyn ArticleStore> = Arc::new(store);
        let locale = store.locale("daikanyama").unwrap().unwrap();

        let primary = ScriptedCompletion::new("claude")
            .reply(TIER_B_REPLY)
            .reply(
                r#"{"events": [{"day": "Wed Sep 23, 2:00 PM", "name": "Ohagi tasting at Toraya", "whyItMatters": "Seasonal sweets.", "category": "dining"}]}"#,
            )
            .reply(DATA_POINT_REPLY);

        let now = Utc.with_ymd_and_hms(2026, 9, 17, 3, 0, 0).unwrap();
        let brief = orchestrator(store, primary.clone(), None).generate(&locale, now).await;

        let section = brief.holiday_section.expect("holiday section");
        assert_eq!(section.holiday_name, "Autumnal Equinox Day");
        assert_eq!(section.date, "Wednesday, September 23");
        assert_eq!(section.events[0].day, "Wed Sep 23, 14:00");

        // Horizon times in the 24-hour clock too
        assert!(brief.horizon_events.iter().all(|e| !e.day.contains("PM")));
        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test]
    async fn test_store_and_model_failures_still_produce_a_brief() {
        let locale = Locale::new("tribeca", "Tribeca", "New York", "USA");
        let primary = ScriptedCompletion::new("claude")
            .fail("Claude API error 500: overloaded")
            .fail("Claude API error 500: overloaded");

        let brief = orchestrator(Arc::new(BrokenStore), primary, None)
            .generate(&locale, october_now())
            .await;

        assert_eq!(brief.rearview_narrative, quiet_week_narrative(&locale));
        assert!(brief.horizon_events.is_empty());
        assert!(brief.holiday_section.is_none());
        assert_eq!(brief.data_point.value, DATA_UNAVAILABLE);
    }
}
