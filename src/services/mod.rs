// markstash services
// Services provide supporting functionality: auth sessions, list reconciliation, settings.

pub mod auth_service;
pub mod reconciler;
pub mod settings_engine;
