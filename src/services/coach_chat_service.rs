use std::sync::Arc;

use rand::Rng;
use tracing::{info, warn};

use crate::models::{
    CoachReplyRequest, CoachStyle, ConversationContext, ReplyResult, ReplySource,
};
use crate::services::coach_templates;
use crate::services::llm_service::{ChatRequest, LlmService};

pub const REPLY_TEMPERATURE: f32 = 0.7;
pub const REPLY_MAX_TOKENS: usize = 180;

const BASE_SYSTEM_PROMPT: &str = "You are an AI financial coach for Australian teenagers (12–18).\n\
- Keep language simple, educational, supportive.\n\
- Focus on diversification, long-term thinking, and risk awareness.\n\
- This is an educational game. Do NOT give real-money instructions.\n\n\
When you reply in chat, prefer 1–3 concise sentences unless asked for more.";

const TRADE_REACTION_INSTRUCTION: &str =
    "The user made a trade. Give a short, style-consistent reaction and one tip.";

/// Produces coach chat replies: asks the LLM when a credential is configured
/// and falls back to templated text on any failure.
pub struct CoachChatService {
    llm: Arc<LlmService>,
}

impl CoachChatService {
    pub fn new(llm: Arc<LlmService>) -> Self {
        Self { llm }
    }

    /// Always yields a non-empty reply; provider failures are absorbed here.
    pub async fn generate_reply(&self, request: &CoachReplyRequest) -> ReplyResult {
        let style = request.style();

        if !self.llm.is_enabled() {
            info!("[CoachChat] source=mock (no api key/client), style={}", style);
            return Self::fallback(request, style);
        }

        let chat = ChatRequest {
            system: build_system_prompt(style),
            user: build_user_prompt(request, style),
            temperature: REPLY_TEMPERATURE,
            max_tokens: REPLY_MAX_TOKENS,
            json_output: false,
        };

        match self.llm.complete(&chat).await {
            Ok(text) => {
                info!("[CoachChat] source=openai, style={}, chars={}", style, text.len());
                ReplyResult {
                    text,
                    source: ReplySource::Ai,
                }
            }
            Err(e) => {
                warn!("[CoachChat] source=mock ({}: {}), style={}", e.kind(), e, style);
                Self::fallback(request, style)
            }
        }
    }

    fn fallback(request: &CoachReplyRequest, style: CoachStyle) -> ReplyResult {
        ReplyResult {
            text: mock_reply(request, style, &mut rand::rng()),
            source: ReplySource::Mock,
        }
    }
}

/// Templated reply for a request, drawing randomness from `rng`.
pub fn mock_reply<R: Rng>(request: &CoachReplyRequest, style: CoachStyle, rng: &mut R) -> String {
    coach_templates::compose_reply(
        style,
        request.action.as_ref(),
        request.user_message().is_some(),
        rng,
    )
}

pub fn build_system_prompt(style: CoachStyle) -> String {
    format!("{}\n\n{}", BASE_SYSTEM_PROMPT, coach_templates::tone_note(style))
}

/// One-line portfolio summary; positions without shares are omitted.
pub fn build_context_text(context: &ConversationContext) -> String {
    let positions: Vec<String> = context
        .holdings
        .iter()
        .filter(|(_, holding)| holding.shares > 0.0)
        .map(|(asset, holding)| {
            format!("{}: {:.4} @ ${:.2}", asset, holding.shares, holding.mark_price())
        })
        .collect();

    let positions = if positions.is_empty() {
        "(no positions)".to_string()
    } else {
        positions.join("; ")
    };

    let action = match &context.last_action {
        Some(a) => format!(
            "Latest action: {} {} {} at ${:.2}.",
            a.kind.to_uppercase(),
            a.amount,
            a.asset,
            a.price_or_zero()
        ),
        None => "(no recent trade)".to_string(),
    };

    format!("Portfolio: {}. Cash: ${:.2}. {}", positions, context.cash, action)
}

pub fn build_user_prompt(request: &CoachReplyRequest, style: CoachStyle) -> String {
    let label = request
        .selected_coach
        .label()
        .unwrap_or_else(|| style.display_name());
    let context = build_context_text(&request.context());

    let ask = match request.user_message() {
        Some(message) => format!("User asks: {}", message),
        None => TRADE_REACTION_INSTRUCTION.to_string(),
    };

    format!("Coach style: {}.\n{}\n\n{}", label, context, ask)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::errors::LlmError;
    use crate::models::{Holding, SelectedCoach, TradeAction};
    use crate::services::llm_service::testing::ScriptedProvider;
    use crate::services::llm_service::LlmConfig;

    fn request(style: &str, message: Option<&str>, action: Option<TradeAction>) -> CoachReplyRequest {
        let mut portfolio = BTreeMap::new();
        portfolio.insert(
            "GLD".to_string(),
            Holding { shares: 5.0, avg_price: 100.0, current_price: Some(101.23) },
        );
        portfolio.insert(
            "QQQ".to_string(),
            Holding { shares: 0.0, avg_price: 300.0, current_price: None },
        );

        CoachReplyRequest {
            selected_coach: SelectedCoach { name: None, style: Some(style.to_string()) },
            user_message: message.map(str::to_string),
            portfolio,
            cash: Some(493.85),
            action,
        }
    }

    fn gld_buy() -> TradeAction {
        TradeAction {
            kind: "buy".into(),
            asset: "GLD".into(),
            amount: 5.0,
            price: Some(101.23),
        }
    }

    fn mock_only() -> CoachChatService {
        CoachChatService::new(Arc::new(LlmService::new(LlmConfig::default())))
    }

    fn scripted(provider: Arc<ScriptedProvider>) -> CoachChatService {
        CoachChatService::new(Arc::new(LlmService::with_provider(LlmConfig::default(), provider)))
    }

    #[tokio::test]
    async fn test_no_credential_returns_template_reply() {
        let service = mock_only();
        for _ in 0..20 {
            let reply = service.generate_reply(&request("Balanced", Some("hi"), None)).await;
            assert_eq!(reply.source, ReplySource::Mock);
            assert!(!reply.text.trim().is_empty());
        }
    }

    #[tokio::test]
    async fn test_conservative_fallback_draws_from_conservative_bank() {
        let service = mock_only();
        let bank = coach_templates::templates_for(CoachStyle::Conservative);
        for _ in 0..50 {
            let reply = service
                .generate_reply(&request("Conservative", Some("what now?"), Some(gld_buy())))
                .await;
            assert!(bank.iter().any(|t| reply.text.contains(t)), "{}", reply.text);
        }
    }

    #[tokio::test]
    async fn test_trade_fallback_starts_with_trade_sentence() {
        let reply = mock_only()
            .generate_reply(&request("Aggressive", None, Some(gld_buy())))
            .await;
        assert!(reply.text.starts_with("You buy 5 GLD at $101.23."), "{}", reply.text);
    }

    #[tokio::test]
    async fn test_provider_text_is_returned_as_ai_reply() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "Safety first! Gold can steady your portfolio.".to_string(),
        )]));
        let reply = scripted(provider.clone())
            .generate_reply(&request("Conservative", None, Some(gld_buy())))
            .await;

        assert_eq!(reply.source, ReplySource::Ai);
        assert_eq!(reply.text, "Safety first! Gold can steady your portfolio.");

        let sent = provider.last_request().unwrap();
        assert_eq!(sent.temperature, REPLY_TEMPERATURE);
        assert_eq!(sent.max_tokens, REPLY_MAX_TOKENS);
        assert!(sent.system.contains("safety first"));
        assert!(sent.user.ends_with(TRADE_REACTION_INSTRUCTION));
    }

    #[tokio::test]
    async fn test_empty_provider_text_falls_back() {
        let provider = Arc::new(ScriptedProvider::always(|| Ok(String::new()), 3));
        let reply = scripted(provider.clone())
            .generate_reply(&request("Tech", None, None))
            .await;

        assert_eq!(reply.source, ReplySource::Mock);
        assert!(!reply.text.is_empty());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_makes_one_attempt() {
        let provider = Arc::new(ScriptedProvider::always(|| Err(LlmError::Unauthorized), 3));
        let reply = scripted(provider.clone())
            .generate_reply(&request("Balanced", Some("hello"), None))
            .await;

        assert_eq!(reply.source, ReplySource::Mock);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_rate_limits_exhaust_attempts_then_fall_back() {
        let provider = Arc::new(ScriptedProvider::always(|| Err(LlmError::RateLimited), 10));
        let reply = scripted(provider.clone())
            .generate_reply(&request("Income", None, Some(gld_buy())))
            .await;

        assert_eq!(reply.source, ReplySource::Mock);
        assert!(reply.text.starts_with("You buy 5 GLD at $101.23."));
        assert_eq!(provider.call_count(), 3);

        let times = provider.call_times();
        assert!(times[1] - times[0] < times[2] - times[1]);
    }

    #[test]
    fn test_context_text_skips_empty_positions() {
        let text = build_context_text(&request("Balanced", None, Some(gld_buy())).context());
        assert_eq!(
            text,
            "Portfolio: GLD: 5.0000 @ $101.23. Cash: $493.85. Latest action: BUY 5 GLD at $101.23."
        );

        let empty = build_context_text(&ConversationContext::default());
        assert_eq!(empty, "Portfolio: (no positions). Cash: $0.00. (no recent trade)");
    }

    #[test]
    fn test_user_prompt_includes_question_when_asked() {
        let req = request("Balanced Coach", Some("  Is gold safe?  "), None);
        let prompt = build_user_prompt(&req, req.style());
        assert!(prompt.starts_with("Coach style: Balanced Coach.\n"));
        assert!(prompt.ends_with("User asks: Is gold safe?"));
    }

    #[test]
    fn test_unknown_style_uses_default_tone() {
        let prompt = build_system_prompt(CoachStyle::from_label(Some("Pirate")));
        assert!(prompt.ends_with("Tone: neutral, encouraging."));
    }

    #[test]
    fn test_mock_reply_is_deterministic_for_seed() {
        let req = request("Tech", Some("tips?"), Some(gld_buy()));
        let a = mock_reply(&req, req.style(), &mut StdRng::seed_from_u64(11));
        let b = mock_reply(&req, req.style(), &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }
}
