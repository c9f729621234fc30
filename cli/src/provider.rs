//! Stats provider backed by the Mojang profile API and the Hypixel player API.

use async_trait::async_trait;
use lobbyscope_core::context::ProviderSettings;
use lobbyscope_core::stats::{GameStats, ProviderError, RateLimiter, StatsProvider, StatsRecord};
use parking_lot::RwLock;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("lobbyscope/", env!("CARGO_PKG_VERSION"));

// ─────────────────────────────────────────────────────────────────────────────
// Bed Wars Level
// ─────────────────────────────────────────────────────────────────────────────

const LEVELS_PER_PRESTIGE: u64 = 100;
const LEVEL_COST: u64 = 5000;
/// The first levels after every prestige are cheaper
const EASY_LEVEL_COSTS: [u64; 4] = [500, 1000, 2000, 3500];
const EASY_EXP: u64 = 500 + 1000 + 2000 + 3500;
const PRESTIGE_EXP: u64 = EASY_EXP + (LEVELS_PER_PRESTIGE - EASY_LEVEL_COSTS.len() as u64) * LEVEL_COST;

/// Level for the given experience; the fraction is progress towards the next level.
pub fn bedwars_level(exp: u64) -> f64 {
    let mut levels = (exp / PRESTIGE_EXP) * LEVELS_PER_PRESTIGE;
    let mut exp = exp % PRESTIGE_EXP;

    for cost in EASY_LEVEL_COSTS {
        if exp < cost {
            break;
        }
        levels += 1;
        exp -= cost;
    }

    levels += exp / LEVEL_COST;
    exp %= LEVEL_COST;

    let next = ((levels + 1) % LEVELS_PER_PRESTIGE) as usize;
    let next_cost = match next {
        1..=4 => EASY_LEVEL_COSTS[next - 1],
        _ => LEVEL_COST,
    };

    levels as f64 + exp as f64 / next_cost as f64
}

/// Ratio where a zero denominator counts as one.
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        numerator as f64
    } else {
        numerator as f64 / denominator as f64
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    success: bool,
    #[serde(default)]
    cause: Option<String>,
    #[serde(default)]
    player: Option<PlayerData>,
}

#[derive(Debug, Deserialize)]
struct PlayerData {
    #[serde(default)]
    stats: Option<PlayerStats>,
}

#[derive(Debug, Deserialize)]
struct PlayerStats {
    #[serde(rename = "Bedwars", default)]
    bedwars: Option<BedwarsStats>,
}

#[derive(Debug, Default, Deserialize)]
struct BedwarsStats {
    #[serde(rename = "Experience", default)]
    experience: f64,
    #[serde(default)]
    final_kills_bedwars: u64,
    #[serde(default)]
    final_deaths_bedwars: u64,
    #[serde(default)]
    wins_bedwars: u64,
    #[serde(default)]
    losses_bedwars: u64,
    /// Missing when the player hides it
    #[serde(default)]
    winstreak: Option<u32>,
}

impl From<BedwarsStats> for GameStats {
    fn from(stats: BedwarsStats) -> Self {
        GameStats {
            level: bedwars_level(stats.experience.max(0.0) as u64),
            kdr: ratio(stats.final_kills_bedwars, stats.final_deaths_bedwars),
            wlr: ratio(stats.wins_bedwars, stats.losses_bedwars),
            winstreak: stats.winstreak,
        }
    }
}

/// Decode a player API response. A null player means the name is unknown (nicked).
fn parse_player_response(player: &str, body: &str) -> Result<StatsRecord, ProviderError> {
    let response: PlayerResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Decode(e.to_string()))?;

    if !response.success {
        let cause = response.cause.unwrap_or_else(|| "unknown cause".to_string());
        return Err(ProviderError::Request(cause));
    }

    let Some(data) = response.player else {
        return Ok(StatsRecord::hidden(player));
    };

    let bedwars = data
        .stats
        .and_then(|s| s.bedwars)
        .unwrap_or_default();
    Ok(StatsRecord::new(player, bedwars.into()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────────────────

pub struct HttpStatsProvider {
    client: reqwest::Client,
    profile_endpoint: String,
    player_endpoint: String,
    /// Replaced at runtime when a new key shows up in the log
    api_key: RwLock<String>,
    limiter: RateLimiter,
}

impl HttpStatsProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            profile_endpoint: settings.profile_endpoint.trim_end_matches('/').to_string(),
            player_endpoint: settings.player_endpoint.clone(),
            api_key: RwLock::new(settings.api_key.clone()),
            limiter: RateLimiter::new(settings.request_limit, settings.request_window()),
        })
    }

    /// Name -> UUID. `None` if no account has this name.
    async fn lookup_uuid(&self, player: &str, timeout: Duration) -> Result<Option<String>, ProviderError> {
        let response = self
            .client
            .get(profile_url(&self.profile_endpoint, player)?)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| request_error(e, timeout))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => return Err(ProviderError::RateLimited),
            status if !status.is_success() => {
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| request_error(e, timeout))?;
        let profile: ProfileResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(Some(profile.id))
    }
}

#[async_trait]
impl StatsProvider for HttpStatsProvider {
    async fn fetch(&self, player: &str, timeout: Duration) -> Result<StatsRecord, ProviderError> {
        let Some(uuid) = self.lookup_uuid(player, timeout).await? else {
            tracing::debug!(player, "No account for name, assuming nicked");
            return Ok(StatsRecord::hidden(player));
        };

        self.limiter.acquire().await;
        let api_key = self.api_key.read().clone();
        let response = self
            .client
            .get(&self.player_endpoint)
            .query(&[("uuid", uuid.as_str())])
            .header("API-Key", api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| request_error(e, timeout))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        let body = response
            .text()
            .await
            .map_err(|e| request_error(e, timeout))?;

        // Error responses carry a `cause` worth reporting over the bare status
        match parse_player_response(player, &body) {
            Err(ProviderError::Decode(_)) if !status.is_success() => Err(ProviderError::Status {
                status: status.as_u16(),
            }),
            result => result,
        }
    }

    fn set_api_key(&self, key: &str) -> bool {
        *self.api_key.write() = key.to_string();
        true
    }
}

/// Profile lookup URL with the player name as an escaped trailing path segment.
fn profile_url(endpoint: &str, player: &str) -> Result<Url, ProviderError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| ProviderError::Request(format!("invalid profile endpoint {endpoint:?}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ProviderError::Request(format!("profile endpoint {endpoint:?} cannot take a path")))?
        .pop_if_empty()
        .push(player);
    Ok(url)
}

fn request_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Request(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_exp() {
        assert_eq!(bedwars_level(0), 0.0);
        assert_eq!(bedwars_level(500), 1.0);
        assert!((bedwars_level(89025) - (20.0 + 2025.0 / 5000.0)).abs() < 1e-9);
        assert!((bedwars_level(2344717) - (481.0 + 4717.0 / 5000.0)).abs() < 1e-9);

        for (exp, level) in [(122986, 27), (954638, 196), (969078, 199), (975611, 202), (977587, 203)] {
            assert_eq!(bedwars_level(exp) as u64, level, "exp {exp}");
        }
    }

    #[test]
    fn test_level_progress_within_easy_levels() {
        // 1 level + half of the 1000 exp needed for level 2
        assert_eq!(bedwars_level(500 + 500), 1.5);
        assert_eq!(bedwars_level(PRESTIGE_EXP), 100.0);
    }

    #[test]
    fn test_profile_url_escapes_name() {
        let url = profile_url("https://api.mojang.com/users/profiles/minecraft", "Player_1").unwrap();
        assert_eq!(url.as_str(), "https://api.mojang.com/users/profiles/minecraft/Player_1");

        let url = profile_url("https://api.mojang.com/users/profiles/minecraft", "a b/c?d#e").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.mojang.com/users/profiles/minecraft/a%20b%2Fc%3Fd%23e"
        );
        assert_eq!(url.path_segments().map(|s| s.count()), Some(4));
    }

    #[test]
    fn test_profile_url_rejects_bad_endpoint() {
        assert!(matches!(
            profile_url("not a url", "Player"),
            Err(ProviderError::Request(_))
        ));
    }

    #[test]
    fn test_api_key_can_be_replaced() {
        let provider = HttpStatsProvider::new(&ProviderSettings::default()).unwrap();
        assert!(provider.set_api_key("fresh-key"));
        assert_eq!(*provider.api_key.read(), "fresh-key");
    }

    #[test]
    fn test_ratio_zero_denominator() {
        assert_eq!(ratio(10, 0), 10.0);
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(9, 3), 3.0);
    }

    #[test]
    fn test_parse_player_stats() {
        let body = r#"{
            "success": true,
            "player": {
                "displayname": "Foo",
                "stats": {
                    "Bedwars": {
                        "Experience": 500,
                        "final_kills_bedwars": 30,
                        "final_deaths_bedwars": 10,
                        "wins_bedwars": 8,
                        "losses_bedwars": 4,
                        "winstreak": 3
                    }
                }
            }
        }"#;

        let record = parse_player_response("Foo", body).unwrap();
        assert_eq!(
            record.stats,
            Some(GameStats {
                level: 1.0,
                kdr: 3.0,
                wlr: 2.0,
                winstreak: Some(3),
            })
        );
    }

    #[test]
    fn test_parse_player_without_bedwars_stats() {
        let body = r#"{"success": true, "player": {"displayname": "New", "stats": {}}}"#;
        let record = parse_player_response("New", body).unwrap();
        let stats = record.stats.unwrap();
        assert_eq!(stats.level, 0.0);
        assert_eq!(stats.winstreak, None);
    }

    #[test]
    fn test_parse_unknown_player_is_hidden() {
        let record = parse_player_response("Nick", r#"{"success": true, "player": null}"#).unwrap();
        assert!(record.is_hidden());
    }

    #[test]
    fn test_parse_api_failure() {
        let err = parse_player_response("Foo", r#"{"success": false, "cause": "Invalid API key"}"#)
            .unwrap_err();
        assert_eq!(err, ProviderError::Request("Invalid API key".to_string()));

        let err = parse_player_response("Foo", "<html>").unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
