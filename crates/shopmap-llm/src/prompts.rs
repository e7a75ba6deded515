//! Prompt builders for the product copywriting endpoints.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::types::GenerationRequest;

const DESCRIPTION_TEMPERATURE: f32 = 0.7;
const NAME_TEMPERATURE: f32 = 0.8;
const NAME_MAX_TOKENS: u32 = 800;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DescriptionLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl DescriptionLength {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    #[must_use]
    pub fn max_tokens(self) -> u32 {
        match self {
            Self::Short => 500,
            Self::Medium => 800,
            Self::Long => 1200,
        }
    }
}

impl FromStr for DescriptionLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(format!(
                "length must be 'short', 'medium' or 'long', got '{other}'"
            )),
        }
    }
}

/// Inputs for a product description.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionPrompt {
    pub title: String,
    pub category: Option<String>,
    pub key_points: Vec<String>,
    pub tone: String,
    pub length: DescriptionLength,
}

/// Inputs for product name suggestions.
#[derive(Debug, Clone, PartialEq)]
pub struct NamePrompt {
    pub product_type: String,
    pub features: Vec<String>,
    pub target_audience: Option<String>,
    pub brand_style: Option<String>,
    pub count: u8,
}

fn bullet_list(items: &[String]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out
}

#[must_use]
pub fn product_description_request(input: &DescriptionPrompt) -> GenerationRequest {
    let mut prompt = format!(
        "Create a {} product description for '{}' with a {} tone.\n",
        input.length.as_str(),
        input.title,
        input.tone
    );
    if let Some(category) = &input.category {
        let _ = writeln!(prompt, "The product belongs to the '{category}' category.");
    }
    if !input.key_points.is_empty() {
        prompt.push_str("\nInclude these key points:\n");
        prompt.push_str(&bullet_list(&input.key_points));
    }
    prompt.push_str("\nMake the description engaging and appealing to potential customers.\n");

    GenerationRequest {
        prompt,
        model: None,
        temperature: DESCRIPTION_TEMPERATURE,
        max_tokens: input.length.max_tokens(),
    }
}

#[must_use]
pub fn product_name_request(input: &NamePrompt) -> GenerationRequest {
    let mut prompt = format!(
        "Generate {} creative and marketable name suggestions for a {}",
        input.count, input.product_type
    );
    if input.features.is_empty() {
        prompt.push_str(".\n");
    } else {
        prompt.push_str(" with the following features:\n");
        prompt.push_str(&bullet_list(&input.features));
    }
    if let Some(audience) = &input.target_audience {
        let _ = writeln!(prompt, "Target audience: {audience}");
    }
    if let Some(style) = &input.brand_style {
        let _ = writeln!(prompt, "Brand style: {style}");
    }
    prompt.push_str(
        "\nFor each suggestion, provide a brief explanation of why it would be effective.\n\
         Format the output as a numbered list.\n",
    );

    GenerationRequest {
        prompt,
        model: None,
        temperature: NAME_TEMPERATURE,
        max_tokens: NAME_MAX_TOKENS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mug() -> DescriptionPrompt {
        DescriptionPrompt {
            title: "Blue Mug".to_string(),
            category: Some("Kitchen".to_string()),
            key_points: vec!["dishwasher safe".to_string(), "350 ml".to_string()],
            tone: "professional".to_string(),
            length: DescriptionLength::default(),
        }
    }

    #[test]
    fn description_prompt_mentions_title_category_and_points() {
        let req = product_description_request(&mug());
        assert!(req.prompt.contains("medium product description for 'Blue Mug'"));
        assert!(req.prompt.contains("professional tone"));
        assert!(req.prompt.contains("'Kitchen' category"));
        assert!(req.prompt.contains("- dishwasher safe\n- 350 ml\n"));
        assert_eq!(req.max_tokens, 800);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn description_token_budget_follows_length() {
        let mut input = mug();
        input.length = DescriptionLength::Short;
        assert_eq!(product_description_request(&input).max_tokens, 500);
        input.length = DescriptionLength::Long;
        assert_eq!(product_description_request(&input).max_tokens, 1200);
    }

    #[test]
    fn description_without_key_points_omits_the_section() {
        let mut input = mug();
        input.key_points.clear();
        input.category = None;
        let req = product_description_request(&input);
        assert!(!req.prompt.contains("key points"));
        assert!(!req.prompt.contains("category"));
    }

    #[test]
    fn length_parses_case_insensitively() {
        assert_eq!("LONG".parse::<DescriptionLength>(), Ok(DescriptionLength::Long));
        assert!("epic".parse::<DescriptionLength>().is_err());
    }

    #[test]
    fn name_prompt_includes_optional_context() {
        let req = product_name_request(&NamePrompt {
            product_type: "water bottle".to_string(),
            features: vec!["insulated".to_string()],
            target_audience: Some("hikers".to_string()),
            brand_style: None,
            count: 3,
        });
        assert!(req
            .prompt
            .starts_with("Generate 3 creative and marketable name suggestions for a water bottle"));
        assert!(req.prompt.contains("- insulated\n"));
        assert!(req.prompt.contains("Target audience: hikers"));
        assert!(!req.prompt.contains("Brand style"));
        assert!(req.prompt.contains("numbered list"));
        assert_eq!(req.max_tokens, 800);
        assert!((req.temperature - 0.8).abs() < f32::EPSILON);
    }
}
