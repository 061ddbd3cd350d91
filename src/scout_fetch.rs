use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::feed::MatchSource;
use crate::http_client::{fetch_text, http_client};
use crate::state::{LiveStats, Match, MatchStatus, Score, Strategy, TeamRef, TeamStats};

/// HTTP source for the ScoutLay backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    client: &'static Client,
}

impl ApiClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base.trim()).with_context(|| format!("invalid api base {base:?}"))?;
        if base.cannot_be_a_base() {
            return Err(anyhow::anyhow!("api base {base} cannot carry a path"));
        }
        Ok(Self {
            base,
            client: http_client(timeout)?,
        })
    }

    pub fn matches_url(&self) -> Url {
        self.endpoint(&["matches"])
    }

    pub fn stats_url(&self, team_id: &str) -> Url {
        self.endpoint(&["stats", team_id])
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl MatchSource for ApiClient {
    fn fetch_matches(&self) -> Result<Vec<Match>> {
        let body = fetch_text(self.client, self.matches_url().as_str())
            .context("matches request failed")?;
        parse_matches_json(&body)
    }

    fn fetch_team_stats(&self, team_id: &str) -> Result<TeamStats> {
        let body = fetch_text(self.client, self.stats_url(team_id).as_str())
            .with_context(|| format!("stats request failed for team {team_id}"))?;
        parse_team_stats_json(&body)
    }
}

/// Accepts `{ "matches": [...] }` or a bare array. Entries without an id are
/// skipped, as are repeated ids after the first.
pub fn parse_matches_json(raw: &str) -> Result<Vec<Match>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }

    let root: Value = serde_json::from_str(trimmed).context("invalid matches json")?;
    let items = match root {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("matches") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut seen = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let wire = match serde_json::from_value::<WireMatch>(item) {
            Ok(wire) => wire,
            Err(err) => {
                tracing::warn!(index = idx, error = %err, "skipping malformed match");
                continue;
            }
        };
        let Some(m) = wire.into_match() else {
            tracing::warn!(index = idx, "skipping match without id");
            continue;
        };
        if !seen.insert(m.id.clone()) {
            tracing::warn!(match_id = %m.id, "duplicate match id in response");
            continue;
        }
        out.push(m);
    }
    Ok(out)
}

pub fn parse_team_stats_json(raw: &str) -> Result<TeamStats> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(TeamStats::default());
    }
    let wire: WireStats = serde_json::from_str(trimmed).context("invalid stats json")?;
    Ok(TeamStats {
        last5: wire.last5.and_then(|w| w.avg_goals_for),
        last10: wire.last10.and_then(|w| w.avg_goals_for),
        season: wire.temporada.and_then(|w| w.avg_goals_for),
    })
}

// Every field is read on its own: a value of the wrong shape becomes `None`
// instead of discarding the whole match.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMatch {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<WireId>,
    #[serde(default, deserialize_with = "lenient")]
    competition: Option<WireNamed>,
    #[serde(default, deserialize_with = "lenient")]
    home_team: Option<WireTeam>,
    #[serde(default, deserialize_with = "lenient")]
    away_team: Option<WireTeam>,
    #[serde(default, deserialize_with = "lenient")]
    utc_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    score: Option<WireScore>,
    #[serde(default, deserialize_with = "lenient")]
    live_stats: Option<WireLiveStats>,
    #[serde(default, deserialize_with = "lenient_list")]
    estrategias: Vec<WireStrategy>,
    #[serde(default, deserialize_with = "lenient_list")]
    strategies: Vec<WireStrategy>,
}

impl WireMatch {
    fn into_match(self) -> Option<Match> {
        let id = self.id?.into_string();
        let status = self
            .status
            .as_deref()
            .map(MatchStatus::from_raw)
            .unwrap_or(MatchStatus::Other(String::new()));
        let score = self.score.map(WireScore::into_score).unwrap_or_default();
        let strategies = if self.estrategias.is_empty() {
            self.strategies
        } else {
            self.estrategias
        };
        let strategies = strategies
            .into_iter()
            .map(|s| Strategy {
                label: s.label,
                reason: s.reason,
                code: s.code.map(WireId::into_string),
            })
            .collect();

        Some(Match {
            id,
            competition: self.competition.and_then(WireNamed::into_name),
            home: self.home_team.map(WireTeam::into_team).unwrap_or_default(),
            away: self.away_team.map(WireTeam::into_team).unwrap_or_default(),
            kickoff: self.utc_date.filter(|s| !s.trim().is_empty()),
            status,
            score,
            live: self.live_stats.map(|l| LiveStats {
                minute: l.minute,
                goals_total: l.goals_total,
                last_goal_minute: l.last_goal_time,
            }),
            strategies,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(u64),
    Text(String),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Number(n) => n.to_string(),
            WireId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireNamed {
    Plain(String),
    Named {
        #[serde(default)]
        name: Option<String>,
    },
}

impl WireNamed {
    fn into_name(self) -> Option<String> {
        match self {
            WireNamed::Plain(name) => Some(name),
            WireNamed::Named { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTeam {
    Plain(String),
    Named {
        #[serde(default)]
        id: Option<WireId>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "shortName")]
        short_name: Option<String>,
    },
}

impl WireTeam {
    fn into_team(self) -> TeamRef {
        match self {
            WireTeam::Plain(name) => TeamRef { id: None, name },
            WireTeam::Named {
                id,
                name,
                short_name,
            } => TeamRef {
                id: id.map(WireId::into_string),
                name: name.or(short_name).unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireScore {
    #[serde(default)]
    full_time: Option<WireGoals>,
    #[serde(default, deserialize_with = "lenient_u32")]
    home: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    away: Option<u32>,
}

impl WireScore {
    fn into_score(self) -> Score {
        let (home, away) = match self.full_time {
            Some(ft) => (ft.home, ft.away),
            None => (self.home, self.away),
        };
        Score {
            home: home.unwrap_or(0),
            away: away.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireGoals {
    #[serde(default, deserialize_with = "lenient_u32")]
    home: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    away: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLiveStats {
    #[serde(default, deserialize_with = "lenient_u32")]
    minute: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    goals_total: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    last_goal_time: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireStrategy {
    #[serde(default)]
    label: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    code: Option<WireId>,
}

#[derive(Debug, Deserialize)]
struct WireStats {
    #[serde(default)]
    last5: Option<WireWindow>,
    #[serde(default)]
    last10: Option<WireWindow>,
    #[serde(default, alias = "season")]
    temporada: Option<WireWindow>,
}

#[derive(Debug, Deserialize)]
struct WireWindow {
    #[serde(default, rename = "avgGoalsFor", deserialize_with = "lenient_f64")]
    avg_goals_for: Option<f64>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

// Items of the wrong shape are dropped; a non-array is an empty list.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

// Numbers occasionally arrive as strings ("45", "1.4") or null.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().trim_end_matches('\'').parse().ok(),
        _ => None,
    }))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_append_to_base_path() {
        let client = ApiClient::new("https://api.example.com/v1/", Duration::from_secs(5))
            .expect("valid base");
        assert_eq!(
            client.matches_url().as_str(),
            "https://api.example.com/v1/matches"
        );
        assert_eq!(
            client.stats_url("86").as_str(),
            "https://api.example.com/v1/stats/86"
        );
    }

    #[test]
    fn stats_url_escapes_team_id() {
        let client =
            ApiClient::new("https://api.example.com", Duration::from_secs(5)).expect("valid base");
        assert_eq!(
            client.stats_url("a/b").as_str(),
            "https://api.example.com/stats/a%2Fb"
        );
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(ApiClient::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn lenient_minute_accepts_strings() {
        let wire: WireLiveStats =
            serde_json::from_str(r#"{"minute":"63'","goalsTotal":null,"lastGoalTime":41}"#)
                .expect("parses");
        assert_eq!(wire.minute, Some(63));
        assert_eq!(wire.goals_total, None);
        assert_eq!(wire.last_goal_time, Some(41));
    }
}
