//! Retrying HTTP client for the external LLM chat endpoint backing the
//! code question-answering service.

pub mod chat;

pub use chat::HttpChatBot;
