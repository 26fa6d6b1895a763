use std::collections::HashMap;

use crate::config::{CONTENT_PLACEHOLDER, RATING_PLACEHOLDER, Settings};

/// Separator and label placed before rating guidance.
pub const GUIDANCE_PREFIX: &str = "\n\n特别说明：";

/// Builds evaluation prompts from the configured template.
pub struct PromptBuilder<'a> {
    template: &'a str,
    rating_prompts: &'a HashMap<String, String>,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(template: &'a str, rating_prompts: &'a HashMap<String, String>) -> Self {
        Self { template, rating_prompts }
    }

    pub fn from_settings(settings: &'a Settings) -> Self {
        Self::new(&settings.template, &settings.rating_prompts)
    }

    pub fn build(&self, content: &str, rating: &str) -> String {
        build(self.template, content, rating, self.rating_prompts)
    }
}

/// Fills `{content}` and `{rating}` once each and appends the rating guidance, if any.
///
/// The template is scanned left to right in a single pass, so text inserted for
/// one placeholder is never searched for the other.
pub fn build(template: &str, content: &str, rating: &str, rating_prompts: &HashMap<String, String>) -> String {
    let mut pending = [(CONTENT_PLACEHOLDER, Some(content)), (RATING_PLACEHOLDER, Some(rating))];
    let mut prompt = String::with_capacity(template.len() + content.len() + rating.len());
    let mut rest = template;

    loop {
        let next = pending
            .iter_mut()
            .filter(|(_, value)| value.is_some())
            .filter_map(|slot| rest.find(slot.0).map(|pos| (pos, slot)))
            .min_by_key(|(pos, _)| *pos);

        let Some((pos, (placeholder, value))) = next else {
            prompt.push_str(rest);
            break;
        };

        prompt.push_str(&rest[..pos]);
        if let Some(value) = value.take() {
            prompt.push_str(value);
        }
        rest = &rest[pos + placeholder.len()..];
    }

    if let Some(guidance) = rating_prompts.get(rating).filter(|g| !g.is_empty()) {
        prompt.push_str(GUIDANCE_PREFIX);
        prompt.push_str(guidance);
    }

    prompt
}
