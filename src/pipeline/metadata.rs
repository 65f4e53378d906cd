use rand::seq::IndexedRandom;

use crate::constants::MAX_TAGS;

const DEFAULT_TITLE: &str = "😂 Funny Short";

pub fn pick_title(templates: &[String]) -> String {
    templates
        .choose(&mut rand::rng())
        .cloned()
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Default tags, then the topic's words, deduplicated and capped.
pub fn build_tags(defaults: &[String], topic: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(MAX_TAGS);
    let topic_words = topic.split_whitespace().map(|w| w.to_lowercase());

    for tag in defaults.iter().cloned().chain(topic_words) {
        if tags.len() == MAX_TAGS {
            break;
        }
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

pub fn build_description(template: &str, script_text: &str) -> String {
    template.replace("{script_content}", script_text)
}
