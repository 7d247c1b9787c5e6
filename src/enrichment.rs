//! Best-effort decorative thumbnails for sticky posts. Failures here must
//! never block or fail a post.

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub url: String,
    pub name: String,
}

#[async_trait]
pub trait ThumbnailProvider: Send + Sync {
    /// Fetch a thumbnail, or `None` when nothing usable came back.
    async fn thumbnail(&self) -> Option<Thumbnail>;
}

/// Fetches a random Pokémon's official artwork from PokeAPI.
pub struct PokeApiThumbnails {
    client: Client,
}

/// Highest Pokédex id with official artwork available.
const MAX_POKEMON_ID: u64 = 898;

impl PokeApiThumbnails {
    pub fn new() -> Self {
        // Dedicated short-timeout client so a slow upstream cannot stall a
        // repost beyond the enrichment budget.
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .user_agent("StickyBot/1.0")
            .build()
            .unwrap_or_default();
        Self { client }
    }

    fn random_pokemon_id() -> u64 {
        rand::thread_rng().gen_range(1..=MAX_POKEMON_ID)
    }
}

impl Default for PokeApiThumbnails {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThumbnailProvider for PokeApiThumbnails {
    async fn thumbnail(&self) -> Option<Thumbnail> {
        let id = Self::random_pokemon_id();
        let url = format!("https://pokeapi.co/api/v2/pokemon/{}", id);

        let body: serde_json::Value = match self.client.get(&url).send().await {
            Ok(response) => match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("thumbnail response unreadable: {}", e);
                    return None;
                }
            },
            Err(e) => {
                tracing::debug!("thumbnail fetch failed: {}", e);
                return None;
            }
        };

        let artwork = &body["sprites"]["other"]["official-artwork"];
        let image = artwork["front_shiny"]
            .as_str()
            .or_else(|| artwork["front_default"].as_str())
            .or_else(|| body["sprites"]["front_shiny"].as_str())
            .or_else(|| body["sprites"]["front_default"].as_str())?;

        let name = body["name"].as_str().unwrap_or("pokemon");
        let mut chars = name.chars();
        let name = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        };

        Some(Thumbnail {
            url: image.to_string(),
            name,
        })
    }
}
