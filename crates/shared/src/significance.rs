use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::completion::{CompletionRequest, CompletionService};
use crate::extractor::extract_json;
use crate::models::{Locale, RearviewStory};
use crate::sanitize::{headline_prefix, sanitize_headline};

pub const MAX_STORIES: usize = 3;

/// How many leading characters two headlines must share to be the same story
pub(crate) const HEADLINE_MATCH_CHARS: usize = 30;

#[derive(Deserialize)]
struct StoriesPayload {
    stories: Vec<RearviewStory>,
}

/// Picks the week's most consequential stories from the headline list
pub struct SignificanceFilter {
    llm: Arc<dyn CompletionService>,
}

impl SignificanceFilter {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    pub async fn select(&self, locale: &Locale, headlines: &[String]) -> Vec<RearviewStory> {
        if headlines.is_empty() {
            debug!("No headlines for {}, skipping significance filter", locale.id);
            return Vec::new();
        }

        match self.try_select(locale, headlines).await {
            Ok(stories) => stories,
            Err(e) => {
                warn!("Significance filter failed for {}: {:#}", locale.id, e);
                Vec::new()
            }
        }
    }

    async fn try_select(&self, locale: &Locale, headlines: &[String]) -> Result<Vec<RearviewStory>> {
        let numbered = headlines
            .iter()
            .enumerate()
            .map(|(idx, headline)| format!("{}. {}", idx + 1, headline))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            r#"You are the editor of a weekly neighborhood newsletter for well-informed residents of {name}, {city}.

From this week's headlines below, pick the {max} stories that matter most to someone who lives here. Rank by:
1. Impact on property and the cost of living here (rents, sales, zoning, major openings or closures)
2. Permanence of the change (a new building or a shuttered institution beats a one-off street fair)
3. Safety patterns (a string of incidents, not a single minor one)

Skip routine listings, promotions and anything a resident would already shrug at.

Headlines:
{numbered}

Copy each chosen headline exactly as written. For each, write one sentence on why it is significant for residents.

Return ONLY JSON:
{{
  "stories": [
    {{"headline": "exact headline", "significance": "one sentence"}}
  ]
}}"#,
            name = locale.name,
            city = locale.city,
            max = MAX_STORIES,
            numbered = numbered,
        );

        let request = CompletionRequest::new(prompt).temperature(0.2).max_tokens(1024);
        let response = self.llm.complete(&request).await?;
        let payload: StoriesPayload = extract_json(&response, "stories")?;

        let stories = resolve_stories(payload.stories, headlines);
        debug!("Significance filter kept {} stories for {}", stories.len(), locale.id);
        Ok(stories)
    }
}

/// Maps each returned headline back to an input headline and drops
/// anything the model invented or repeated.
fn resolve_stories(returned: Vec<RearviewStory>, headlines: &[String]) -> Vec<RearviewStory> {
    let mut resolved: Vec<RearviewStory> = Vec::new();

    for story in returned {
        let Some(headline) = match_headline(&story.headline, headlines) else {
            debug!("Dropping story with unknown headline: {}", story.headline);
            continue;
        };
        if resolved.iter().any(|s| &s.headline == headline) {
            continue;
        }
        resolved.push(RearviewStory {
            headline: headline.clone(),
            significance: story.significance,
        });
        if resolved.len() == MAX_STORIES {
            break;
        }
    }

    resolved
}

fn match_headline<'a>(candidate: &str, headlines: &'a [String]) -> Option<&'a String> {
    let candidate = sanitize_headline(candidate);
    if candidate.is_empty() {
        return None;
    }

    if let Some(exact) = headlines.iter().find(|h| **h == candidate) {
        return Some(exact);
    }
    if let Some(folded) = headlines.iter().find(|h| h.eq_ignore_ascii_case(&candidate)) {
        return Some(folded);
    }

    // Fuzzy matching only on full-length prefixes; a short headline is
    // contained in too many unrelated ones
    let long_enough = |text: &str| text.trim().chars().count() >= HEADLINE_MATCH_CHARS;
    let lower_candidate = candidate.to_lowercase();
    let key = headline_prefix(&candidate, HEADLINE_MATCH_CHARS);
    headlines.iter().find(|h| {
        (long_enough(&candidate) && h.to_lowercase().contains(&key))
            || (long_enough(h) && lower_candidate.contains(&headline_prefix(h, HEADLINE_MATCH_CHARS)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::ScriptedCompletion;

    fn locale() -> Locale {
        Locale::new("tribeca", "Tribeca", "New York", "United States")
    }

    fn headlines() -> Vec<String> {
        vec![
            "Landmark cast-iron building sold for $48 million".to_string(),
            "Third bike theft on Franklin Street this month".to_string(),
            "Pop-up ice cream truck visits Hudson River Park".to_string(),
            "City approves rezoning of Canal Street corridor".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_empty_week_skips_model() {
        let fake = ScriptedCompletion::new("fake");
        let filter = SignificanceFilter::new(fake.clone());
        let stories = filter.select(&locale(), &[]).await;
        assert!(stories.is_empty());
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_selects_and_resolves_headlines() {
        let fake = ScriptedCompletion::new("fake").reply(
            r#"Here are the picks:
```json
{"stories": [
  {"headline": "[Real Estate] City approves rezoning of Canal Street corridor", "significance": "Opens the corridor to residential towers."},
  {"headline": "landmark cast-iron building sold for $48 million", "significance": "Sets a new price benchmark."},
  {"headline": "A story nobody wrote", "significance": "Invented."},
  {"headline": "Third bike theft on Franklin Street", "significance": "A pattern is forming."}
]}
```"#,
        );
        let filter = SignificanceFilter::new(fake.clone());
        let stories = filter.select(&locale(), &headlines()).await;

        assert_eq!(stories.len(), 3);
        assert_eq!(stories[0].headline, "City approves rezoning of Canal Street corridor");
        assert_eq!(stories[1].headline, "Landmark cast-iron building sold for $48 million");
        assert_eq!(stories[2].headline, "Third bike theft on Franklin Street this month");
        assert_eq!(fake.calls(), 1);
        assert!(fake.requests()[0].prompt.contains("4. City approves rezoning"));
    }

    #[tokio::test]
    async fn test_caps_at_three_and_dedupes() {
        let fake = ScriptedCompletion::new("fake").reply(
            r#"{"stories": [
              {"headline": "Landmark cast-iron building sold for $48 million", "significance": "a"},
              {"headline": "Landmark cast-iron building sold for $48 million", "significance": "dup"},
              {"headline": "Third bike theft on Franklin Street this month", "significance": "b"},
              {"headline": "Pop-up ice cream truck visits Hudson River Park", "significance": "c"},
              {"headline": "City approves rezoning of Canal Street corridor", "significance": "d"}
            ]}"#,
        );
        let filter = SignificanceFilter::new(fake);
        let stories = filter.select(&locale(), &headlines()).await;
        assert_eq!(stories.len(), MAX_STORIES);
        assert_eq!(stories[0].significance, "a");
        assert_eq!(stories[1].significance, "b");
    }

    #[tokio::test]
    async fn test_short_headline_does_not_absorb_invented_story() {
        let fake = ScriptedCompletion::new("fake").reply(
            r#"{"stories": [
              {"headline": "Rent strike spreads across all of Lower Manhattan", "significance": "Invented."},
              {"headline": "Rent", "significance": "Real."}
            ]}"#,
        );
        let filter = SignificanceFilter::new(fake);
        let headlines = vec!["Rent".to_string(), "Franklin Street repaving starts Monday".to_string()];

        let stories = filter.select(&locale(), &headlines).await;
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].headline, "Rent");
        assert_eq!(stories[0].significance, "Real.");
    }

    #[test]
    fn test_truncated_story_headline_still_matches() {
        let headlines = headlines();
        let matched = match_headline("Pop-up ice cream truck visits Hudson", &headlines);
        assert_eq!(matched.map(String::as_str), Some("Pop-up ice cream truck visits Hudson River Park"));
        assert_eq!(match_headline("Pop-up", &headlines), None);
    }

    #[tokio::test]
    async fn test_unparseable_response_yields_no_stories() {
        let fake = ScriptedCompletion::new("fake").reply("I could not decide, sorry.");
        let filter = SignificanceFilter::new(fake);
        assert!(filter.select(&locale(), &headlines()).await.is_empty());
    }

    #[tokio::test]
    async fn test_service_failure_yields_no_stories() {
        let fake = ScriptedCompletion::new("fake").fail("Claude API error 500");
        let filter = SignificanceFilter::new(fake);
        assert!(filter.select(&locale(), &headlines()).await.is_empty());
    }
}
