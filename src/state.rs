use std::sync::Arc;

use crate::external::price_provider::PriceProvider;
use crate::services::coach_chat_service::CoachChatService;
use crate::services::coach_service::CoachAdviceService;
use crate::services::llm_service::LlmService;

#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<LlmService>,
    pub coach_chat: Arc<CoachChatService>,
    pub coach_advice: Arc<CoachAdviceService>,
    pub price_provider: Arc<dyn PriceProvider>,
}

impl AppState {
    /// Wires the coach services around one shared LLM client.
    pub fn new(llm: Arc<LlmService>, price_provider: Arc<dyn PriceProvider>) -> Self {
        Self {
            coach_chat: Arc::new(CoachChatService::new(llm.clone())),
            coach_advice: Arc::new(CoachAdviceService::new(llm.clone())),
            llm,
            price_provider,
        }
    }
}
