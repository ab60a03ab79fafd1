// CV review pipeline: prompt building, backend orchestration, result contract.
// All LLM calls go through llm_client via the ChatBackend trait.

pub mod handlers;
pub mod models;
pub mod prompts;
pub mod service;
