pub mod coach_chat_service;
pub mod coach_service;
pub mod coach_templates;
pub mod llm_service;
pub mod price_service;
