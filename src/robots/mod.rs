//! Robots policy gate
//!
//! A boolean gate consulted before a URL's first enqueue. The site's
//! robots.txt is fetched once per run; when it cannot be fetched or read,
//! the gate degrades to allow-all with a warning.

use reqwest::Client;
use robotstxt::DefaultMatcher;
use url::Url;

/// Parsed robots policy for the crawled host
#[derive(Debug, Clone)]
pub struct RobotsGate {
    /// Raw robots.txt content; None means allow all
    content: Option<String>,
    user_agent: String,
}

impl RobotsGate {
    /// Fetches robots.txt for the base URL's host
    ///
    /// Never fails: any fetch or read problem produces an allow-all gate.
    pub async fn fetch(client: &Client, base_url: &Url, user_agent: &str) -> Self {
        let robots_url = match base_url.join("/robots.txt") {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("Could not build robots.txt URL: {}", e);
                return Self::allow_all(user_agent);
            }
        };

        match client.get(robots_url.as_str()).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(content) => {
                    tracing::info!("Loaded robots.txt from {}", robots_url);
                    Self::from_content(&content, user_agent)
                }
                Err(e) => {
                    tracing::warn!("Could not read robots.txt body: {}", e);
                    Self::allow_all(user_agent)
                }
            },
            Ok(response) => {
                tracing::info!(
                    "No robots.txt ({} from {}), allowing all",
                    response.status(),
                    robots_url
                );
                Self::allow_all(user_agent)
            }
            Err(e) => {
                tracing::warn!("Could not fetch robots.txt: {}", e);
                Self::allow_all(user_agent)
            }
        }
    }

    /// Creates a gate from raw robots.txt content
    pub fn from_content(content: &str, user_agent: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            user_agent: user_agent.to_string(),
        }
    }

    /// Creates a permissive gate that allows everything
    pub fn allow_all(user_agent: &str) -> Self {
        Self {
            content: None,
            user_agent: user_agent.to_string(),
        }
    }

    /// Checks whether the policy allows fetching the URL
    pub fn is_allowed(&self, url: &Url) -> bool {
        match &self.content {
            None => true,
            Some(content) if content.is_empty() => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, &self.user_agent, url.as_str())
            }
        }
    }
}
