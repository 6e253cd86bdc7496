use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Longest free-text chat message accepted from the game client.
pub const MAX_USER_MESSAGE_CHARS: usize = 2000;

/// Coaching persona selecting tone guidance and the fallback template bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoachStyle {
    Conservative,
    Balanced,
    Aggressive,
    Tech,
    Income,
    Default,
}

impl CoachStyle {
    /// Resolves a client-supplied label such as "Conservative Coach" or "aggressive".
    /// Unrecognized or missing labels resolve to `CoachStyle::Default`.
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return CoachStyle::Default;
        };

        let normalized = label.trim().to_lowercase();
        let normalized = normalized
            .strip_suffix("coach")
            .unwrap_or(&normalized)
            .trim();

        match normalized {
            "conservative" => CoachStyle::Conservative,
            "balanced" => CoachStyle::Balanced,
            "aggressive" => CoachStyle::Aggressive,
            "tech" | "technology" => CoachStyle::Tech,
            "income" | "dividend" => CoachStyle::Income,
            _ => CoachStyle::Default,
        }
    }

    /// Detects a persona mentioned anywhere in free text, e.g. a player context blurb.
    pub fn detect_in(text: &str) -> Option<Self> {
        [
            ("Conservative Coach", CoachStyle::Conservative),
            ("Balanced Coach", CoachStyle::Balanced),
            ("Aggressive Coach", CoachStyle::Aggressive),
            ("Income Coach", CoachStyle::Income),
            ("Tech Coach", CoachStyle::Tech),
        ]
        .into_iter()
        .find(|(needle, _)| text.contains(needle))
        .map(|(_, style)| style)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CoachStyle::Conservative => "Conservative Coach",
            CoachStyle::Balanced => "Balanced Coach",
            CoachStyle::Aggressive => "Aggressive Coach",
            CoachStyle::Tech => "Tech Coach",
            CoachStyle::Income => "Income Coach",
            CoachStyle::Default => "Coach",
        }
    }
}

impl fmt::Display for CoachStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectedCoach {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

impl SelectedCoach {
    /// The label the client chose: style first, then name.
    pub fn label(&self) -> Option<&str> {
        self.style
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.name.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub avg_price: f64,
    #[serde(default)]
    pub current_price: Option<f64>,
}

impl Holding {
    pub fn mark_price(&self) -> f64 {
        self.current_price.unwrap_or(self.avg_price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub asset: String,
    pub amount: f64,
    #[serde(default)]
    pub price: Option<f64>,
}

impl TradeAction {
    pub fn price_or_zero(&self) -> f64 {
        self.price.unwrap_or(0.0)
    }
}

/// Portfolio snapshot the coach reacts to. Built per request, never persisted.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub holdings: BTreeMap<String, Holding>,
    pub cash: f64,
    pub last_action: Option<TradeAction>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachReplyRequest {
    #[serde(default)]
    pub selected_coach: SelectedCoach,
    #[serde(default)]
    pub user_message: Option<String>,
    #[serde(default)]
    pub portfolio: BTreeMap<String, Holding>,
    #[serde(default)]
    pub cash: Option<f64>,
    #[serde(default)]
    pub action: Option<TradeAction>,
}

impl CoachReplyRequest {
    pub fn style(&self) -> CoachStyle {
        CoachStyle::from_label(self.selected_coach.label())
    }

    /// Trimmed user message, `None` when absent or blank.
    pub fn user_message(&self) -> Option<&str> {
        self.user_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    pub fn context(&self) -> ConversationContext {
        ConversationContext {
            holdings: self.portfolio.clone(),
            cash: self.cash.unwrap_or(0.0),
            last_action: self.action.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(message) = &self.user_message {
            if message.chars().count() > MAX_USER_MESSAGE_CHARS {
                return Err(format!(
                    "userMessage must be at most {} characters",
                    MAX_USER_MESSAGE_CHARS
                ));
            }
        }

        if let Some(cash) = self.cash {
            ensure_non_negative("cash", cash)?;
        }

        for (asset, holding) in &self.portfolio {
            ensure_non_negative(&format!("portfolio.{}.shares", asset), holding.shares)?;
            ensure_non_negative(&format!("portfolio.{}.avgPrice", asset), holding.avg_price)?;
            if let Some(price) = holding.current_price {
                ensure_non_negative(&format!("portfolio.{}.currentPrice", asset), price)?;
            }
        }

        if let Some(action) = &self.action {
            if action.asset.trim().is_empty() {
                return Err("action.asset must not be empty".to_string());
            }
            ensure_non_negative("action.amount", action.amount)?;
            if let Some(price) = action.price {
                ensure_non_negative("action.price", price)?;
            }
        }

        Ok(())
    }
}

fn ensure_non_negative(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must be a finite, non-negative number", field));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachReplyResponse {
    pub reply: String,
}

/// Where a coach reply came from. Logged, never returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Ai,
    Mock,
}

impl fmt::Display for ReplySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplySource::Ai => f.write_str("openai"),
            ReplySource::Mock => f.write_str("mock"),
        }
    }
}

/// A non-empty reply plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyResult {
    pub text: String,
    pub source: ReplySource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl PlayerLevel {
    /// Anything other than beginner/intermediate is treated as advanced.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "beginner" => PlayerLevel::Beginner,
            "intermediate" => PlayerLevel::Intermediate,
            _ => PlayerLevel::Advanced,
        }
    }
}

/// Request for structured coach advice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoachRequest {
    pub player_level: String,
    #[serde(default)]
    pub current_portfolio: BTreeMap<String, f64>,
    pub investment_goal: String,
    pub risk_tolerance: f64,
    pub time_horizon: u32,
    #[serde(default)]
    pub completed_missions: Vec<String>,
    #[serde(default)]
    pub current_mission: Option<String>,
    #[serde(default)]
    pub player_context: Option<String>,
}

impl CoachRequest {
    pub fn level(&self) -> PlayerLevel {
        PlayerLevel::parse(&self.player_level)
    }

    pub fn personality(&self) -> Option<CoachStyle> {
        self.player_context.as_deref().and_then(CoachStyle::detect_in)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.risk_tolerance.is_finite() || !(0.0..=1.0).contains(&self.risk_tolerance) {
            return Err("risk_tolerance must be between 0.0 and 1.0".to_string());
        }
        for (asset, weight) in &self.current_portfolio {
            ensure_non_negative(&format!("current_portfolio.{}", asset), *weight)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CoachResponse {
    pub advice: String,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub risk_assessment: String,
    pub educational_insights: Vec<String>,
    pub encouragement: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_labels_resolve_case_insensitively() {
        assert_eq!(CoachStyle::from_label(Some("Conservative Coach")), CoachStyle::Conservative);
        assert_eq!(CoachStyle::from_label(Some("conservative")), CoachStyle::Conservative);
        assert_eq!(CoachStyle::from_label(Some("  AGGRESSIVE coach ")), CoachStyle::Aggressive);
        assert_eq!(CoachStyle::from_label(Some("Tech Coach")), CoachStyle::Tech);
        assert_eq!(CoachStyle::from_label(Some("Income")), CoachStyle::Income);
        assert_eq!(CoachStyle::from_label(Some("Wizard")), CoachStyle::Default);
        assert_eq!(CoachStyle::from_label(None), CoachStyle::Default);
    }

    #[test]
    fn test_selected_coach_prefers_style_over_name() {
        let coach = SelectedCoach {
            name: Some("Balanced Coach".into()),
            style: Some("Aggressive".into()),
        };
        assert_eq!(coach.label(), Some("Aggressive"));

        let coach = SelectedCoach {
            name: Some("Balanced Coach".into()),
            style: Some("   ".into()),
        };
        assert_eq!(coach.label(), Some("Balanced Coach"));
    }

    #[test]
    fn test_reply_request_deserializes_client_payload() {
        let payload = r#"{
            "selectedCoach": {"name": "Conservative Coach", "style": "Conservative"},
            "userMessage": "  should I buy more gold?  ",
            "portfolio": {"GLD": {"shares": 5, "avgPrice": 100.0, "currentPrice": 101.23}},
            "cash": 500.5,
            "action": {"type": "buy", "asset": "GLD", "amount": 5, "price": 101.23}
        }"#;

        let request: CoachReplyRequest = serde_json::from_str(payload).unwrap();
        assert_eq!(request.style(), CoachStyle::Conservative);
        assert_eq!(request.user_message(), Some("should I buy more gold?"));

        let context = request.context();
        assert_eq!(context.cash, 500.5);
        assert_eq!(context.holdings["GLD"].mark_price(), 101.23);
        assert_eq!(context.last_action.unwrap().kind, "buy");
    }

    #[test]
    fn test_reply_request_rejects_negative_values() {
        let mut request: CoachReplyRequest = serde_json::from_str("{}").unwrap();
        assert!(request.validate().is_ok());

        request.cash = Some(-1.0);
        assert!(request.validate().is_err());

        request.cash = Some(10.0);
        request.action = Some(TradeAction {
            kind: "sell".into(),
            asset: "AAPL".into(),
            amount: f64::NAN,
            price: None,
        });
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_reply_request_rejects_oversized_message() {
        let mut request: CoachReplyRequest = serde_json::from_str("{}").unwrap();
        request.user_message = Some("x".repeat(MAX_USER_MESSAGE_CHARS + 1));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_personality_detected_from_player_context() {
        let request = CoachRequest {
            player_level: "Beginner".into(),
            current_portfolio: BTreeMap::new(),
            investment_goal: "balanced".into(),
            risk_tolerance: 0.4,
            time_horizon: 365,
            completed_missions: vec![],
            current_mission: None,
            player_context: Some("Playing with the Income Coach in 2008".into()),
        };
        assert_eq!(request.level(), PlayerLevel::Beginner);
        assert_eq!(request.personality(), Some(CoachStyle::Income));
    }
}
