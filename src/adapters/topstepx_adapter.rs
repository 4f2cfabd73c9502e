//! TopstepX REST broker adapter.
//!
//! Every endpoint is a JSON `POST` carrying a bearer token from
//! `/api/Auth/loginKey`. Responses carry a `success` flag; an unsuccessful
//! lookup or retrieval is logged and returned as an empty result.

use crate::domain::bar::Bar;
use crate::domain::contract::Contract;
use crate::domain::error::RollstitchError;
use crate::ports::broker_port::{BarsRequest, BrokerPort};
use crate::ports::config_port::ConfigPort;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::cell::RefCell;
use tracing::{debug, info, warn};

pub const DEFAULT_API_KEY_ENV: &str = "TOPSTEPX_API_KEY";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tokens are refreshed this long before the session would expire.
const REFRESH_MARGIN_MINUTES: i64 = 5;

pub struct TopstepXSettings {
    pub base_url: String,
    pub username: String,
    pub api_key: SecretString,
    pub session_ttl: Duration,
    pub timeout: std::time::Duration,
}

impl TopstepXSettings {
    /// Read `[broker]`. The key comes from `api_key`, or else from the
    /// environment variable named by `api_key_env`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RollstitchError> {
        let base_url = required(config, "base_url")?;
        let username = required(config, "username")?;

        let api_key = match config.get_string("broker", "api_key").filter(|k| !k.trim().is_empty()) {
            Some(key) => key,
            None => {
                let var = config
                    .get_string("broker", "api_key_env")
                    .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
                std::env::var(&var).map_err(|_| RollstitchError::ConfigMissing {
                    section: "broker".to_string(),
                    key: format!("api_key (or ${var})"),
                })?
            }
        };

        let ttl_hours = config.get_int("broker", "session_ttl_hours", DEFAULT_SESSION_TTL_HOURS);
        if ttl_hours < 1 {
            return Err(RollstitchError::ConfigInvalid {
                section: "broker".to_string(),
                key: "session_ttl_hours".to_string(),
                reason: "session_ttl_hours must be at least 1".to_string(),
            });
        }
        let timeout_secs = config.get_int("broker", "timeout_secs", DEFAULT_TIMEOUT_SECS as i64);
        let timeout_secs = u64::try_from(timeout_secs)
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| RollstitchError::ConfigInvalid {
                section: "broker".to_string(),
                key: "timeout_secs".to_string(),
                reason: "timeout_secs must be positive".to_string(),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            api_key: SecretString::new(api_key.into()),
            session_ttl: Duration::hours(ttl_hours),
            timeout: std::time::Duration::from_secs(timeout_secs),
        })
    }
}

fn required(config: &dyn ConfigPort, key: &str) -> Result<String, RollstitchError> {
    config
        .get_string("broker", key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| RollstitchError::ConfigMissing {
            section: "broker".to_string(),
            key: key.to_string(),
        })
}

struct Session {
    token: SecretString,
    acquired_at: DateTime<Utc>,
}

pub struct TopstepXAdapter {
    client: Client,
    settings: TopstepXSettings,
    session: RefCell<Option<Session>>,
}

impl TopstepXAdapter {
    pub fn new(settings: TopstepXSettings) -> Result<Self, RollstitchError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(broker_error)?;
        Ok(Self {
            client,
            settings,
            session: RefCell::new(None),
        })
    }

    fn ensure_authenticated(&self) -> Result<(), RollstitchError> {
        let valid = self
            .session
            .borrow()
            .as_ref()
            .is_some_and(|s| token_valid(s.acquired_at, self.settings.session_ttl, Utc::now()));
        if valid {
            return Ok(());
        }
        self.login()
    }

    fn login(&self) -> Result<(), RollstitchError> {
        let url = format!("{}/api/Auth/loginKey", self.settings.base_url);
        let payload = json!({
            "username": self.settings.username,
            "apiKey": self.settings.api_key.expose_secret(),
        });
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|e| RollstitchError::Auth {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RollstitchError::Auth {
                reason: format!("login request failed with HTTP {status}"),
            });
        }
        let body: Value = response.json().map_err(|e| RollstitchError::Auth {
            reason: format!("login response was not JSON: {e}"),
        })?;

        let token = parse_login(&body)?;
        *self.session.borrow_mut() = Some(Session {
            token: SecretString::new(token.into()),
            acquired_at: Utc::now(),
        });
        info!(username = %self.settings.username, "authenticated with TopstepX");
        Ok(())
    }

    /// Authenticated POST. `Ok(None)` for non-2xx or non-JSON responses.
    fn post(&self, path: &str, payload: &Value) -> Result<Option<Value>, RollstitchError> {
        self.ensure_authenticated()?;
        let token = match self.session.borrow().as_ref() {
            Some(session) => session.token.expose_secret().to_string(),
            None => {
                return Err(RollstitchError::Auth {
                    reason: "no session after login".to_string(),
                })
            }
        };

        let url = format!("{}{}", self.settings.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .map_err(broker_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            warn!(path, %status, body = %text, "request failed");
            return Ok(None);
        }
        match response.json::<Value>() {
            Ok(body) => Ok(Some(body)),
            Err(e) => {
                warn!(path, error = %e, "response was not valid JSON");
                Ok(None)
            }
        }
    }
}

impl BrokerPort for TopstepXAdapter {
    fn authenticate(&self) -> Result<(), RollstitchError> {
        self.ensure_authenticated()
    }

    fn search_contracts(&self, text: &str, live: bool) -> Result<Vec<Contract>, RollstitchError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.post("/api/Contract/search", &json!({ "searchText": text, "live": live }))?;
        Ok(body.as_ref().map(parse_contracts).unwrap_or_default())
    }

    fn contract_by_id(&self, id: &str) -> Result<Option<Contract>, RollstitchError> {
        let body = self.post("/api/Contract/searchById", &json!({ "contractId": id }))?;
        Ok(body.as_ref().and_then(parse_contract_lookup))
    }

    fn retrieve_bars(&self, request: &BarsRequest) -> Result<Vec<Bar>, RollstitchError> {
        let payload = bars_payload(request);
        let Some(body) = self.post("/api/History/retrieveBars", &payload)? else {
            return Ok(Vec::new());
        };
        if !is_success(&body) {
            warn!(
                contract_id = %request.contract_id,
                error = body.get("errorMessage").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
                "bar retrieval unsuccessful"
            );
            return Ok(Vec::new());
        }
        let bars = parse_bars(&body);
        debug!(contract_id = %request.contract_id, rows = bars.len(), "retrieved bars");
        Ok(bars)
    }
}

fn broker_error(err: reqwest::Error) -> RollstitchError {
    RollstitchError::Broker {
        reason: err.to_string(),
    }
}

/// Whether a token acquired at `acquired_at` is still usable at `now`.
pub fn token_valid(acquired_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    now < acquired_at + ttl - Duration::minutes(REFRESH_MARGIN_MINUTES)
}

pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn bars_payload(request: &BarsRequest) -> Value {
    json!({
        "contractId": request.contract_id,
        "live": request.live,
        "startTime": format_instant(request.start),
        "endTime": format_instant(request.end),
        "unit": request.unit.wire_code(),
        "unitNumber": request.unit_number,
        "limit": request.limit,
        "includePartialBar": request.include_partial_bar,
    })
}

fn is_success(body: &Value) -> bool {
    body.get("success").and_then(Value::as_bool).unwrap_or(false)
}

fn parse_login(body: &Value) -> Result<String, RollstitchError> {
    if !is_success(body) {
        let message = body
            .get("errorMessage")
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("login rejected");
        return Err(RollstitchError::Auth {
            reason: message.to_string(),
        });
    }
    body.get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RollstitchError::Auth {
            reason: "login response carried no token".to_string(),
        })
}

/// One bar as the history endpoint sends it.
#[derive(Debug, Deserialize)]
pub struct TopstepXBar {
    #[serde(rename = "t", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
}

impl TopstepXBar {
    fn into_bar(self) -> Option<Bar> {
        let prices = [self.open, self.high, self.low, self.close];
        if self.volume < 0.0 || !self.volume.is_finite() || !prices.iter().all(|p| p.is_finite()) {
            return None;
        }
        Some(Bar {
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TopstepXBarsResponse {
    #[serde(default)]
    bars: Vec<Value>,
}

/// Bars from a `retrieveBars` body. Rows that do not deserialize into a
/// complete bar, or carry negative volume, are dropped.
pub fn parse_bars(body: &Value) -> Vec<Bar> {
    let Ok(response) = TopstepXBarsResponse::deserialize(body) else {
        return Vec::new();
    };
    let total = response.bars.len();
    let bars: Vec<Bar> = response
        .bars
        .iter()
        .filter_map(|item| TopstepXBar::deserialize(item).ok())
        .filter_map(TopstepXBar::into_bar)
        .collect();
    if bars.len() < total {
        debug!(dropped = total - bars.len(), "dropped malformed bars");
    }
    bars
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_timestamp(&value).ok_or_else(|| serde::de::Error::custom("unreadable bar timestamp"))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc))
                .or_else(|| {
                    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

pub fn parse_contracts(body: &Value) -> Vec<Contract> {
    let items = match body {
        Value::Array(items) => items,
        _ => match body.get("contracts").and_then(Value::as_array) {
            Some(items) => items,
            None => return Vec::new(),
        },
    };
    items.iter().filter_map(parse_contract).collect()
}

fn parse_contract_lookup(body: &Value) -> Option<Contract> {
    if !is_success(body) {
        return None;
    }
    body.get("contract").and_then(parse_contract)
}

fn parse_contract(value: &Value) -> Option<Contract> {
    let mut contract: Contract = serde_json::from_value(value.clone()).ok()?;
    if contract.id.trim().is_empty() {
        return None;
    }
    if contract.symbol.is_none() {
        contract.symbol = contract.name.clone();
    }
    Some(contract)
}
