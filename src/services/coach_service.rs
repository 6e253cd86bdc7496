use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::errors::LlmError;
use crate::models::{CoachRequest, CoachResponse, CoachStyle, PlayerLevel};
use crate::services::llm_service::{ChatRequest, LlmService};

const ADVICE_TEMPERATURE: f32 = 0.7;
const ADVICE_MAX_TOKENS: usize = 500;
const MAX_RECOMMENDATIONS: usize = 4;
const MAX_NEXT_STEPS: usize = 3;

/// Structured coach advice: LLM output in a fixed JSON shape, or canned advice
/// for the player's level when the provider is unavailable.
pub struct CoachAdviceService {
    llm: Arc<LlmService>,
}

impl CoachAdviceService {
    pub fn new(llm: Arc<LlmService>) -> Self {
        Self { llm }
    }

    pub async fn get_advice(&self, request: &CoachRequest) -> CoachResponse {
        let level = request.level();

        if !self.llm.is_enabled() {
            info!("[Coach] source=mock (no api key/client), level={:?}", level);
            return mock_advice(level);
        }

        let personality = request.personality();
        info!(
            "[Coach] requesting AI advice (level: {:?}, personality: {:?}, goal: {})",
            level, personality, request.investment_goal
        );

        let chat = ChatRequest {
            system: build_system_prompt(level, personality),
            user: build_user_prompt(request),
            temperature: ADVICE_TEMPERATURE,
            max_tokens: ADVICE_MAX_TOKENS,
            json_output: true,
        };

        match self.llm.complete(&chat).await.and_then(|raw| parse_advice(&raw)) {
            Ok(advice) => {
                info!(
                    "[Coach] source=openai (recs: {}, steps: {})",
                    advice.recommendations.len(),
                    advice.next_steps.len()
                );
                advice
            }
            Err(e) => {
                warn!("[Coach] source=mock ({}: {})", e.kind(), e);
                mock_advice(level)
            }
        }
    }
}

fn build_system_prompt(level: PlayerLevel, personality: Option<CoachStyle>) -> String {
    let mut prompt = String::from(
        "You are an AI financial coach for Australian teenagers aged 12-18. \
Your role is to provide educational, encouraging, and age-appropriate financial advice.\n\n\
Key principles:\n\
- Use simple, clear language\n\
- Be encouraging and supportive\n\
- Focus on long-term thinking\n\
- Emphasize diversification and risk management\n\
- Avoid encouraging day trading or speculation\n\
- Make learning fun and engaging\n\n\
Respond with a single JSON object with exactly these keys:\n\
{\"advice\": string (2-3 sentences), \"recommendations\": [string] (3-4 items), \
\"next_steps\": [string] (2-3 items), \"risk_assessment\": string, \
\"educational_insights\": [string] (1-2 items), \"encouragement\": string}\n",
    );

    if let Some(style) = personality {
        let focus = match style {
            CoachStyle::Conservative => Some(
                "safety and stability first; bonds, gold, and defensive stocks; capital preservation; steady, reliable returns",
            ),
            CoachStyle::Balanced => Some(
                "a mix of growth and stability; diversified asset allocation; moderate risk; stocks, ETFs, and REITs",
            ),
            CoachStyle::Aggressive => Some(
                "high-growth opportunities; crypto and growth stocks; innovation and emerging markets; embracing volatility for growth",
            ),
            CoachStyle::Income => Some(
                "passive income; dividend-paying investments; compound interest; regular cash flow",
            ),
            CoachStyle::Tech => Some(
                "technology themes; diversification within and beyond the tech sector; valuation versus growth",
            ),
            CoachStyle::Default => None,
        };
        if let Some(focus) = focus {
            prompt.push_str(&format!("\nCoach Style: {}. Your approach emphasizes {}.\n", style, focus));
        }
    }

    let level_focus = match level {
        PlayerLevel::Beginner => {
            "basic concepts like diversification, the power of compound interest, starting with low-risk investments, building good habits early"
        }
        PlayerLevel::Intermediate => {
            "risk vs reward trade-offs, portfolio rebalancing, understanding market cycles, asset allocation strategies"
        }
        PlayerLevel::Advanced => {
            "advanced portfolio optimization, risk management strategies, market analysis techniques, preparing for real-world investing"
        }
    };
    prompt.push_str(&format!("\nFocus on: {}.", level_focus));

    prompt
}

fn build_user_prompt(request: &CoachRequest) -> String {
    let missions = if request.completed_missions.is_empty() {
        "None".to_string()
    } else {
        request.completed_missions.join(", ")
    };

    let mut prompt = format!(
        "Player Context:\n\
- Level: {}\n\
- Risk Tolerance: {:.2}/1.0\n\
- Time Horizon: {} days\n\
- Investment Goal: {}\n\
- Completed Missions: {}\n\
- Current Mission: {}\n\n\
Current Portfolio:\n",
        request.player_level,
        request.risk_tolerance,
        request.time_horizon,
        request.investment_goal,
        missions,
        request.current_mission.as_deref().unwrap_or("None"),
    );

    if request.current_portfolio.is_empty() {
        prompt.push_str("- (empty)\n");
    }
    for (asset, weight) in &request.current_portfolio {
        prompt.push_str(&format!("- {}: {:.1}%\n", asset, weight * 100.0));
    }

    if let Some(context) = request.player_context.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("\nAdditional Context: {}\n", context.trim()));
    }

    prompt.push_str(
        "\nGive personalized advice that addresses their portfolio and goals, suits their level, \
and teaches an important financial concept. This is a risk-free educational game.",
    );
    prompt
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Reads the provider's JSON object. `advice` is mandatory; other fields fall
/// back to generic defaults and lists are capped.
fn parse_advice(raw: &str) -> Result<CoachResponse, LlmError> {
    let body = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("advice is not JSON: {}", e)))?;

    let advice = non_empty_str(&parsed["advice"])
        .ok_or_else(|| LlmError::InvalidResponse("advice field missing".to_string()))?;

    let mut recommendations = string_list(&parsed["recommendations"]);
    if recommendations.is_empty() {
        recommendations = vec![
            "Focus on diversification".to_string(),
            "Learn about different asset classes".to_string(),
        ];
    }
    recommendations.truncate(MAX_RECOMMENDATIONS);

    let mut next_steps = string_list(&parsed["next_steps"]);
    if next_steps.is_empty() {
        next_steps = vec![
            "Continue learning about investing".to_string(),
            "Practice with different portfolios".to_string(),
        ];
    }
    next_steps.truncate(MAX_NEXT_STEPS);

    let mut educational_insights = string_list(&parsed["educational_insights"]);
    if educational_insights.is_empty() {
        educational_insights = vec!["Diversification helps reduce risk".to_string()];
    }

    Ok(CoachResponse {
        advice,
        recommendations,
        next_steps,
        risk_assessment: non_empty_str(&parsed["risk_assessment"])
            .unwrap_or_else(|| "Your portfolio shows good diversification.".to_string()),
        educational_insights,
        encouragement: non_empty_str(&parsed["encouragement"])
            .unwrap_or_else(|| "You're doing great! Keep learning and practicing.".to_string()),
    })
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn mock_advice(level: PlayerLevel) -> CoachResponse {
    match level {
        PlayerLevel::Beginner => CoachResponse {
            advice: "Great job starting your investment journey! Remember, diversification is key to managing risk.".to_string(),
            recommendations: owned(&[
                "Start with low-risk assets like bonds and ETFs",
                "Learn about compound interest and time value of money",
                "Practice with different asset allocations",
                "Focus on long-term goals rather than short-term gains",
            ]),
            next_steps: owned(&[
                "Complete more beginner missions to unlock new assets",
                "Try different portfolio combinations",
                "Read about basic investment concepts",
            ]),
            risk_assessment: "Your current portfolio shows good diversification for a beginner.".to_string(),
            educational_insights: owned(&[
                "Diversification helps reduce overall portfolio risk",
                "Time in the market beats timing the market",
            ]),
            encouragement: "You're building great financial habits! Keep learning and practicing.".to_string(),
        },
        PlayerLevel::Intermediate => CoachResponse {
            advice: "You're developing a solid understanding of investment principles. Consider optimizing your risk-return profile.".to_string(),
            recommendations: owned(&[
                "Rebalance your portfolio regularly",
                "Consider adding more growth assets if your risk tolerance allows",
                "Learn about market cycles and economic indicators",
                "Practice with different time horizons",
            ]),
            next_steps: owned(&[
                "Try the portfolio optimization feature",
                "Experiment with different rebalancing strategies",
                "Complete advanced missions to unlock more assets",
            ]),
            risk_assessment: "Your portfolio shows good balance between growth and stability.".to_string(),
            educational_insights: owned(&[
                "Rebalancing helps maintain target risk levels",
                "Market volatility is normal and expected",
            ]),
            encouragement: "You're becoming a confident investor! Keep exploring and learning.".to_string(),
        },
        PlayerLevel::Advanced => CoachResponse {
            advice: "Excellent work! You're ready to explore advanced investment strategies and optimization techniques.".to_string(),
            recommendations: owned(&[
                "Use portfolio optimization tools to maximize risk-adjusted returns",
                "Consider alternative assets and strategies",
                "Learn about advanced risk management techniques",
                "Prepare for real-world investing with proper research",
            ]),
            next_steps: owned(&[
                "Master the portfolio optimization features",
                "Try complex multi-asset strategies",
                "Learn about advanced financial concepts",
            ]),
            risk_assessment: "Your portfolio demonstrates sophisticated understanding of risk management.".to_string(),
            educational_insights: owned(&[
                "Advanced optimization can improve risk-adjusted returns",
                "Real-world investing requires continuous learning and adaptation",
            ]),
            encouragement: "You're well-prepared for real-world investing! Keep pushing your knowledge boundaries.".to_string(),
        },
    }
}
