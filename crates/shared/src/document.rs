use crate::data_point::DATA_UNAVAILABLE;
use crate::models::WeeklyBriefContent;

pub const REARVIEW_HEADER: &str = "[[The Rearview]]";
pub const HORIZON_HEADER: &str = "[[The Horizon]]";
pub const HOLIDAY_HEADER: &str = "[[Holiday Watch]]";
pub const DATA_POINT_HEADER: &str = "[[The Data Point]]";

pub struct DocumentFormatter;

impl DocumentFormatter {
    /// Plain-text article body with `[[Section]]` headers. Sections with
    /// nothing to say are left out entirely.
    pub fn format(content: &WeeklyBriefContent) -> String {
        let mut doc = String::new();

        // The narrative is never empty; quiet weeks get their own text
        doc.push_str(REARVIEW_HEADER);
        doc.push_str("\n\n");
        doc.push_str(content.rearview_narrative.trim());
        doc.push_str("\n\n");

        if !content.horizon_events.is_empty() {
            doc.push_str(HORIZON_HEADER);
            doc.push_str("\n\n");
            for event in &content.horizon_events {
                doc.push_str(&format!("{}: {} - {}\n", event.day, event.name, event.why_it_matters));
            }
            doc.push('\n');
        }

        if let Some(section) = content.holiday_section.as_ref().filter(|s| !s.events.is_empty()) {
            doc.push_str(HOLIDAY_HEADER);
            doc.push_str("\n\n");
            doc.push_str(&format!("{}\n\n{}\n\n", section.holiday_name, section.date));
            for event in &section.events {
                doc.push_str(&format!("{}: {} - {}\n", event.day, event.name, event.description));
            }
            doc.push('\n');
        }

        let point = &content.data_point;
        if point.value != DATA_UNAVAILABLE {
            doc.push_str(DATA_POINT_HEADER);
            doc.push_str("\n\n");
            doc.push_str(&format!("{}\n\n{}\n\n", point.label, point.value));
            if !point.context.is_empty() {
                doc.push_str(&format!("{}\n\n", point.context));
            }
        }

        doc.trim_end().to_string()
    }
}
