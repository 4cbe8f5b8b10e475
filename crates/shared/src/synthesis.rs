use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::completion::{CompletionRequest, CompletionService};
use crate::models::{Article, Locale, RearviewStory};
use crate::sanitize::headline_prefix;
use crate::significance::HEADLINE_MATCH_CHARS;

/// Characters of source body passed along per story
const MAX_BODY_CHARS: usize = 1500;

pub fn quiet_week_narrative(locale: &Locale) -> String {
    format!(
        "It was a quiet week in {}. No single story stood out enough to make the rearview, \
         which in a neighborhood like this is its own kind of news. Enjoy the calm while it lasts.",
        locale.name
    )
}

/// Fallback when the model is unavailable but stories were selected
fn recap_narrative(locale: &Locale, stories: &[RearviewStory]) -> String {
    let mut narrative = format!("Here is what mattered in {} this week.", locale.name);
    for story in stories {
        narrative.push_str("\n\n");
        narrative.push_str(story.headline.trim_end_matches('.'));
        narrative.push_str(". ");
        narrative.push_str(&story.significance);
    }
    narrative
}

/// Best-matching article for a selected headline. Matches on the leading
/// characters only, so near-duplicate headlines can pick the wrong body.
pub fn find_source_article<'a>(headline: &str, articles: &'a [Article]) -> Option<&'a Article> {
    let key = headline_prefix(headline, HEADLINE_MATCH_CHARS);
    if key.is_empty() {
        return None;
    }
    articles
        .iter()
        .find(|article| article.headline.to_lowercase().contains(&key))
}

/// Article bodies may arrive as HTML
fn plain_body(body: &str) -> String {
    let text = if body.contains('<') {
        html2text::from_read(body.as_bytes(), 120)
    } else {
        body.to_string()
    };
    let text = text.trim();

    if text.len() > MAX_BODY_CHARS {
        let mut end = MAX_BODY_CHARS;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}

/// Writes the week's stories up as one narrative
pub struct EditorialSynthesizer {
    llm: Arc<dyn CompletionService>,
}

impl EditorialSynthesizer {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    pub async fn synthesize(&self, locale: &Locale, stories: &[RearviewStory], articles: &[Article]) -> String {
        if stories.is_empty() {
            debug!("No stories for {}, using quiet-week narrative", locale.id);
            return quiet_week_narrative(locale);
        }

        match self.try_synthesize(locale, stories, articles).await {
            Ok(narrative) if !narrative.trim().is_empty() => narrative,
            Ok(_) => {
                warn!("Synthesis returned empty text for {}, using recap", locale.id);
                recap_narrative(locale, stories)
            }
            Err(e) => {
                warn!("Synthesis failed for {}: {:#}, using recap", locale.id, e);
                recap_narrative(locale, stories)
            }
        }
    }

    fn story_context(stories: &[RearviewStory], articles: &[Article]) -> String {
        stories
            .iter()
            .enumerate()
            .map(|(idx, story)| {
                let source = find_source_article(&story.headline, articles);
                let section = source
                    .and_then(|article| article.category_label.as_deref())
                    .map(str::trim)
                    .filter(|label| !label.is_empty())
                    .map(|label| format!("SECTION: {}\n", label))
                    .unwrap_or_default();
                let body = source
                    .map(|article| plain_body(&article.body))
                    .filter(|body| !body.is_empty())
                    .unwrap_or_else(|| "(no source text available)".to_string());
                format!(
                    "STORY {}: {}\n{}WHY IT MATTERS: {}\nSOURCE:\n{}",
                    idx + 1,
                    story.headline,
                    section,
                    story.significance,
                    body
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn try_synthesize(&self, locale: &Locale, stories: &[RearviewStory], articles: &[Article]) -> Result<String> {
        let context = Self::story_context(stories, articles);

        let prompt = format!(
            r#"You write the "Rearview" column of the Sunday Edition for {name}, {city}: a look back at the week that just ended.

Weave the stories below into one cohesive narrative of 150 to 250 words in 2 or 3 short paragraphs. Connect them where there is a real thread (money, a street, a pattern); do not force one. Write for a sharp local reader: specific, dry, no hype, no exclamation marks, no headers or bullet points. Do not use em dashes.

{context}

Return only the narrative text."#,
            name = locale.name,
            city = locale.city,
            context = context,
        );

        let request = CompletionRequest::new(prompt).temperature(0.7).max_tokens(1024);
        let narrative = self.llm.complete(&request).await?;
        Ok(narrative.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::ScriptedCompletion;
    use chrono::Utc;

    fn locale() -> Locale {
        Locale::new("le-marais", "Le Marais", "Paris", "France")
    }

    fn article(headline: &str, body: &str) -> Article {
        Article {
            headline: headline.to_string(),
            body: body.to_string(),
            category_label: None,
            published_at: Utc::now(),
        }
    }

    fn story(headline: &str) -> RearviewStory {
        RearviewStory {
            headline: headline.to_string(),
            significance: "It matters.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_no_stories_uses_quiet_week_without_model() {
        let fake = ScriptedCompletion::new("fake");
        let synthesizer = EditorialSynthesizer::new(fake.clone());
        let narrative = synthesizer.synthesize(&locale(), &[], &[]).await;
        assert_eq!(narrative, quiet_week_narrative(&locale()));
        assert!(narrative.contains("Le Marais"));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_call_with_story_context() {
        let fake = ScriptedCompletion::new("fake").reply("  The week belonged to the Picasso museum.  ");
        let synthesizer = EditorialSynthesizer::new(fake.clone());
        let articles = vec![article(
            "Musée Picasso announces free Sunday evenings starting in November",
            "<p>The museum will open <b>free</b> on Sunday evenings.</p>",
        )];
        let stories = vec![story("Musée Picasso announces free Sunday evenings")];

        let narrative = synthesizer.synthesize(&locale(), &stories, &articles).await;
        assert_eq!(narrative, "The week belonged to the Picasso museum.");
        assert_eq!(fake.calls(), 1);

        let prompt = &fake.requests()[0].prompt;
        assert!(prompt.contains("STORY 1: Musée Picasso"));
        assert!(prompt.contains("free"));
        assert!(!prompt.contains("<b>"));
    }

    #[test]
    fn test_story_context_carries_section_label() {
        let mut labelled = article("New bakery opens on Rue Vieille du Temple", "Croissants.");
        labelled.category_label = Some("Dining".to_string());
        let articles = vec![labelled, article("Fountain restored in Place des Vosges", "Water again.")];
        let stories = vec![
            story("New bakery opens on Rue Vieille du Temple"),
            story("Fountain restored in Place des Vosges"),
        ];

        let context = EditorialSynthesizer::story_context(&stories, &articles);
        assert!(context.contains("STORY 1: New bakery opens on Rue Vieille du Temple\nSECTION: Dining\nWHY IT MATTERS"));
        assert!(context.contains("STORY 2: Fountain restored in Place des Vosges\nWHY IT MATTERS"));
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_recap() {
        let fake = ScriptedCompletion::new("fake").fail("timeout");
        let synthesizer = EditorialSynthesizer::new(fake);
        let stories = vec![story("Rue des Rosiers goes pedestrian")];
        let narrative = synthesizer.synthesize(&locale(), &stories, &[]).await;
        assert!(narrative.starts_with("Here is what mattered in Le Marais"));
        assert!(narrative.contains("Rue des Rosiers goes pedestrian. It matters."));
    }

    #[test]
    fn test_source_match_uses_leading_characters() {
        let articles = vec![
            article("Bakery on Rue de Bretagne closes after 80 years", "first"),
            article("Bakery on Rue de Bretagne closes after 80 years, owners say", "second"),
        ];
        let found = find_source_article("Bakery on Rue de Bretagne closes", &articles).unwrap();
        // Near-duplicates resolve to the first candidate
        assert_eq!(found.body, "first");
        assert!(find_source_article("Unrelated headline", &articles).is_none());
    }

    #[test]
    fn test_long_body_truncated_on_char_boundary() {
        let body = "é".repeat(MAX_BODY_CHARS);
        let plain = plain_body(&body);
        assert!(plain.ends_with("..."));
        assert!(plain.len() <= MAX_BODY_CHARS + 3);
    }
}
