//! Chat-completions reasoning client.
//!
//! Sends the persona, a compact market view and the already-sized decision,
//! and expects a JSON object back:
//!
//! ```json
//! {"action": "BUY" | "SELL" | "HOLD", "rationale": "..."}
//! ```
//!
//! `action` must repeat the proposed action or be `HOLD`. Anything else,
//! including prose around an unparseable object, is malformed output.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{StrategyError, StrategyResult};
use crate::narrator::{Narration, NarrationRequest, Narrator, Verdict};

const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
const DEFAULT_MODEL: &str = "grok-4-1-fast-reasoning";

/// Longest rationale accepted from the service.
const MAX_RATIONALE_CHARS: usize = 1_000;

/// Reasoning service configuration.
#[derive(Clone)]
pub struct ReasoningConfig {
    pub api_key: Zeroizing<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_key: Zeroizing::new(String::new()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

impl ReasoningConfig {
    /// Read `REASONING_API_KEY`, `REASONING_API_URL` and `REASONING_MODEL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: Zeroizing::new(std::env::var("REASONING_API_KEY").unwrap_or_default()),
            base_url: std::env::var("REASONING_API_URL").unwrap_or(defaults.base_url),
            model: std::env::var("REASONING_MODEL").unwrap_or(defaults.model),
            timeout: defaults.timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for ReasoningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Schema of the reasoner's reply.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReasonerReply {
    action: String,
    rationale: String,
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
pub struct ReasoningClient {
    config: ReasoningConfig,
    http: Client,
}

impl ReasoningClient {
    /// Create a new client.
    pub fn new(config: ReasoningConfig) -> StrategyResult<Self> {
        if !config.is_configured() {
            return Err(StrategyError::Reasoning(
                "reasoning API key not configured".to_string(),
            ));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StrategyError::Reasoning(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    async fn chat(&self, system: &str, prompt: &str) -> StrategyResult<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.4,
            max_tokens: 400,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.api_key.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StrategyError::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    StrategyError::Reasoning(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Reasoning service returned error status");
            return Err(StrategyError::Reasoning(format!("HTTP {status}: {body}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| StrategyError::MalformedOutput(format!("unreadable response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| StrategyError::MalformedOutput("no choices in response".to_string()))
    }
}

const SYSTEM_PROMPT: &str = "You narrate trades for a stock game agent. \
The trade size is fixed and you cannot change it. Reply with one JSON object only: \
{\"action\": \"<the proposed action or HOLD>\", \"rationale\": \"<at most two sentences>\"}.";

fn build_prompt(request: &NarrationRequest) -> String {
    let persona = &request.persona;
    let snapshot = &request.snapshot;

    let mut market = String::new();
    for quote in &snapshot.instruments {
        let change = quote
            .change_24h_pct
            .map(|c| format!("{}%", c.round_dp(2)))
            .unwrap_or_else(|| "n/a".to_string());
        market.push_str(&format!("- {} ({}): {} 24h {}\n", quote.ticker, quote.name, quote.price, change));
    }

    let proposed = serde_json::to_string(&request.proposed).unwrap_or_else(|_| request.proposed.label().to_string());

    format!(
        "Agent: {name} ({strategy}, {risk} risk)\n\
         Cash: {cash} ({cash_pct}% of portfolio), positions held: {positions}\n\
         Market:\n{market}\n\
         Proposed decision: {proposed}\n\
         Either confirm the proposed action with a rationale in the agent's voice, or answer HOLD with the reason.",
        name = persona.name,
        strategy = persona.strategy,
        risk = persona.risk.as_str(),
        cash = snapshot.cash_available.round_dp(2),
        cash_pct = snapshot.cash_pct().round_dp(1),
        positions = snapshot.positions.len(),
    )
}

/// Validate raw service output against the reply schema.
pub(crate) fn parse_reply(raw: &str, request: &NarrationRequest) -> StrategyResult<Narration> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => {
            return Err(StrategyError::MalformedOutput(
                "no JSON object in reply".to_string(),
            ))
        }
    };

    let reply: ReasonerReply = serde_json::from_str(json)
        .map_err(|e| StrategyError::MalformedOutput(format!("reply does not match schema: {e}")))?;

    let rationale = reply.rationale.trim();
    if rationale.is_empty() {
        return Err(StrategyError::MalformedOutput("empty rationale".to_string()));
    }
    if rationale.chars().count() > MAX_RATIONALE_CHARS {
        return Err(StrategyError::MalformedOutput("rationale too long".to_string()));
    }

    let action = reply.action.trim().to_ascii_uppercase();
    let verdict = if action == "HOLD" {
        Verdict::Hold
    } else if action == request.proposed.label() {
        Verdict::Proceed
    } else {
        return Err(StrategyError::MalformedOutput(format!(
            "action {action} does not match proposed {}",
            request.proposed.label()
        )));
    };

    Ok(Narration {
        verdict,
        rationale: rationale.to_string(),
        raw: raw.to_string(),
    })
}

#[async_trait]
impl Narrator for ReasoningClient {
    fn name(&self) -> &'static str {
        "reasoning"
    }

    async fn narrate(&self, request: &NarrationRequest) -> StrategyResult<Narration> {
        debug!(persona = %request.persona.name, model = %self.config.model, "Requesting narration");
        let raw = self.chat(SYSTEM_PROMPT, &build_prompt(request)).await?;
        parse_reply(&raw, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Decision;
    use crate::persona::{BudgetBand, Persona, RiskBand, StrategyKind};
    use crate::snapshot::{InstrumentQuote, MarketSnapshot};
    use bourse_core::{AccountId, InstrumentId, Price, Shares, Ticker};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn request() -> NarrationRequest {
        NarrationRequest {
            persona: Persona::new(
                "Momentum Mike",
                StrategyKind::Momentum,
                RiskBand::High,
                BudgetBand {
                    min_pct: dec!(1),
                    max_pct: dec!(5),
                },
            ),
            snapshot: MarketSnapshot {
                account_id: AccountId::new("mike"),
                cash_available: dec!(1000),
                instruments: vec![InstrumentQuote {
                    instrument_id: InstrumentId::new("acme"),
                    ticker: Ticker::new("ACME"),
                    name: "Acme".to_string(),
                    sector: None,
                    price: Price::new(dec!(10)),
                    change_24h_pct: Some(dec!(4)),
                }],
                positions: Vec::new(),
                taken_at: Utc::now(),
            },
            proposed: Decision::buy(InstrumentId::new("acme"), Shares::new(dec!(5)), "momentum"),
        }
    }

    #[test]
    fn test_parse_confirming_reply() {
        let narration = parse_reply(
            "```json\n{\"action\": \"buy\", \"rationale\": \"ACME is ripping.\"}\n```",
            &request(),
        )
        .unwrap();
        assert_eq!(narration.verdict, Verdict::Proceed);
        assert_eq!(narration.rationale, "ACME is ripping.");
    }

    #[test]
    fn test_parse_veto() {
        let narration = parse_reply(r#"{"action":"HOLD","rationale":"Too frothy."}"#, &request()).unwrap();
        assert_eq!(narration.verdict, Verdict::Hold);
    }

    #[test]
    fn test_reject_malformed_replies() {
        let req = request();
        for raw in [
            "I think you should buy.",
            r#"{"action":"SELL","rationale":"Switch sides"}"#,
            r#"{"action":"BUY","rationale":"   "}"#,
            r#"{"action":"BUY","rationale":"ok","shares":"500"}"#,
            r#"{"action":"BUY"}"#,
        ] {
            assert!(
                matches!(parse_reply(raw, &req), Err(StrategyError::MalformedOutput(_))),
                "accepted: {raw}"
            );
        }
    }

    #[test]
    fn test_prompt_mentions_market_and_decision() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains("ACME"));
        assert!(prompt.contains("\"action\":\"BUY\""));
    }

    #[test]
    fn test_client_requires_key() {
        assert!(ReasoningClient::new(ReasoningConfig::default()).is_err());
        assert!(format!("{:?}", ReasoningConfig::default()).contains("<redacted>"));
    }
}
