//! Gift recommendations: language model first, curated catalog as fallback,
//! then every idea is enriched with an image and a purchase link.

use db::models::friend::Friend;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    amazon::AmazonService,
    gift_catalog,
    image_search::ImageSearchService,
    openai_api::{OpenAiClient, OpenAiError},
};

pub const DEFAULT_COUNT: usize = 5;
pub const MAX_COUNT: usize = 10;

const SYSTEM_PROMPT: &str = "You are a thoughtful personal shopper. You suggest specific, purchasable \
     gifts that fit the recipient's personality and interests. Output valid JSON only.";

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("openai error: {0}")]
    OpenAi(#[from] OpenAiError),
    #[error("model returned no usable recommendations")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct GiftRecommendation {
    pub name: String,
    pub description: String,
    pub price: String,
    pub reasoning: String,
    pub category: String,
    pub image_url: Option<String>,
    pub purchase_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    Ai,
    Curated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct RecommendationRequest {
    pub budget: Option<String>,
    pub occasion: Option<String>,
    pub count: Option<usize>,
}

impl RecommendationRequest {
    pub fn count(&self) -> usize {
        self.count.unwrap_or(DEFAULT_COUNT).clamp(1, MAX_COUNT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RecommendationResponse {
    pub friend_id: Uuid,
    pub source: RecommendationSource,
    pub recommendations: Vec<GiftRecommendation>,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    #[serde(default)]
    recommendations: Vec<ModelGift>,
}

#[derive(Debug, Deserialize)]
struct ModelGift {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    category: Option<String>,
}

impl ModelGift {
    fn into_recommendation(self) -> Option<GiftRecommendation> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let price = match self.price {
            Some(Value::String(p)) => p.trim().to_string(),
            Some(Value::Number(n)) => format!("${n}"),
            _ => String::new(),
        };
        Some(GiftRecommendation {
            name,
            description: self.description.trim().to_string(),
            price,
            reasoning: self.reasoning.trim().to_string(),
            category: self
                .category
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "Gift".to_string()),
            image_url: None,
            purchase_url: None,
        })
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none given".to_string()
    } else {
        items.join(", ")
    }
}

pub fn build_prompt(
    friend: &Friend,
    request: &RecommendationRequest,
    saved: &[String],
    count: usize,
) -> String {
    let mut prompt = format!(
        r#"Suggest {count} gift ideas for my friend {name}.

## About {name}
- Personality traits: {traits}
- Interests: {interests}
"#,
        name = friend.name,
        traits = list_or_none(&friend.personality_traits),
        interests = list_or_none(&friend.interests),
    );
    if let Some(notes) = &friend.notes {
        prompt.push_str(&format!("- Notes: {notes}\n"));
    }
    if let Some(occasion) = request.occasion.as_deref().filter(|o| !o.trim().is_empty()) {
        prompt.push_str(&format!("\nOccasion: {}\n", occasion.trim()));
    }
    if let Some(budget) = request.budget.as_deref().filter(|b| !b.trim().is_empty()) {
        prompt.push_str(&format!("Budget: {} (do not exceed it)\n", budget.trim()));
    }
    if !saved.is_empty() {
        prompt.push_str(&format!(
            "\nAlready chosen, do not suggest these again: {}\n",
            saved.join(", ")
        ));
    }
    prompt.push_str(
        r#"
## Output Format
Return ONLY a JSON object with this structure:
{
  "recommendations": [
    {
      "name": "Specific product name",
      "description": "One or two sentences about the gift",
      "price": "$25",
      "reasoning": "Why it suits this person",
      "category": "Short category such as Outdoors or Books"
    }
  ]
}
"#,
    );
    prompt
}

#[derive(Clone)]
pub struct GiftRecommender {
    openai: Option<OpenAiClient>,
    images: ImageSearchService,
    amazon: AmazonService,
}

impl GiftRecommender {
    pub fn new(openai: Option<OpenAiClient>, images: ImageSearchService, amazon: AmazonService) -> Self {
        Self {
            openai,
            images,
            amazon,
        }
    }

    /// Produces recommendations for a friend. Never fails: model errors fall
    /// back to the curated catalog.
    pub async fn recommend(
        &self,
        friend: &Friend,
        request: &RecommendationRequest,
        saved: &[String],
    ) -> RecommendationResponse {
        let count = request.count();
        let (source, gifts) = match &self.openai {
            Some(client) => match self.ask_model(client, friend, request, saved, count).await {
                Ok(gifts) => (RecommendationSource::Ai, gifts),
                Err(e) => {
                    warn!(friend_id = %friend.id, error = %e, "AI recommendations failed, using curated catalog");
                    (RecommendationSource::Curated, self.curated(friend, request, saved, count))
                }
            },
            None => {
                debug!("No OpenAI key configured, using curated catalog");
                (RecommendationSource::Curated, self.curated(friend, request, saved, count))
            }
        };

        let recommendations = join_all(gifts.into_iter().map(|gift| self.enrich(gift))).await;
        info!(
            friend_id = %friend.id,
            source = ?source,
            count = recommendations.len(),
            "Generated gift recommendations"
        );
        RecommendationResponse {
            friend_id: friend.id,
            source,
            recommendations,
        }
    }

    async fn ask_model(
        &self,
        client: &OpenAiClient,
        friend: &Friend,
        request: &RecommendationRequest,
        saved: &[String],
        count: usize,
    ) -> Result<Vec<GiftRecommendation>, RecommendationError> {
        let prompt = build_prompt(friend, request, saved, count);
        let response: ModelResponse = client.ask_json(SYSTEM_PROMPT, &prompt, 1500).await?;
        let gifts: Vec<_> = response
            .recommendations
            .into_iter()
            .filter_map(ModelGift::into_recommendation)
            .take(count)
            .collect();
        if gifts.is_empty() {
            return Err(RecommendationError::Empty);
        }
        Ok(gifts)
    }

    fn curated(
        &self,
        friend: &Friend,
        request: &RecommendationRequest,
        saved: &[String],
        count: usize,
    ) -> Vec<GiftRecommendation> {
        gift_catalog::recommend(
            friend,
            request.budget.as_deref(),
            request.occasion.as_deref(),
            saved,
            count,
        )
    }

    async fn enrich(&self, mut gift: GiftRecommendation) -> GiftRecommendation {
        if gift.image_url.is_none() {
            gift.image_url = Some(self.images.find_image(&gift.name, &gift.category).await);
        }
        if gift.purchase_url.is_none() {
            gift.purchase_url = Some(self.amazon.search_url(&gift.name));
        }
        gift
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::services::product_metadata::ProductMetadataService;

    fn friend() -> Friend {
        Friend {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Maya".into(),
            photo_url: None,
            personality_traits: vec!["Curious".into()],
            interests: vec!["Hiking".into(), "Coffee".into()],
            notes: Some("Just moved to Denver".into()),
            birthday: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn recommender() -> GiftRecommender {
        GiftRecommender::new(
            None,
            ImageSearchService::new(None, None),
            AmazonService::new(Some("gg-20".into()), ProductMetadataService::default()),
        )
    }

    #[test]
    fn count_is_clamped() {
        let mut request = RecommendationRequest::default();
        assert_eq!(request.count(), DEFAULT_COUNT);
        request.count = Some(0);
        assert_eq!(request.count(), 1);
        request.count = Some(50);
        assert_eq!(request.count(), MAX_COUNT);
    }

    #[test]
    fn prompt_mentions_profile_and_exclusions() {
        let request = RecommendationRequest {
            budget: Some("$50".into()),
            occasion: Some("Birthday".into()),
            count: None,
        };
        let prompt = build_prompt(&friend(), &request, &["Headlamp".into()], 5);
        assert!(prompt.contains("Hiking, Coffee"));
        assert!(prompt.contains("Occasion: Birthday"));
        assert!(prompt.contains("Budget: $50"));
        assert!(prompt.contains("do not suggest these again: Headlamp"));
        assert!(prompt.contains("Just moved to Denver"));
    }

    #[test]
    fn model_output_is_normalised() {
        let parsed: ModelResponse = serde_json::from_str(
            r#"{"recommendations": [
                {"name": " Pour-Over Kit ", "price": 45, "reasoning": "Loves coffee"},
                {"name": "  "}
            ]}"#,
        )
        .unwrap();
        let gifts: Vec<_> = parsed
            .recommendations
            .into_iter()
            .filter_map(ModelGift::into_recommendation)
            .collect();
        assert_eq!(gifts.len(), 1);
        assert_eq!(gifts[0].name, "Pour-Over Kit");
        assert_eq!(gifts[0].price, "$45");
        assert_eq!(gifts[0].category, "Gift");
    }

    #[tokio::test]
    async fn without_model_curated_ideas_are_enriched() {
        let request = RecommendationRequest {
            count: Some(3),
            ..Default::default()
        };
        let response = recommender().recommend(&friend(), &request, &[]).await;
        assert_eq!(response.source, RecommendationSource::Curated);
        assert_eq!(response.recommendations.len(), 3);
        for gift in &response.recommendations {
            assert!(gift.image_url.as_deref().unwrap().starts_with("https://placehold.co/"));
            let link = gift.purchase_url.as_deref().unwrap();
            assert!(link.starts_with("https://www.amazon.com/s?k="));
            assert!(link.ends_with("&tag=gg-20"));
        }
    }
}
