// src/providers/mod.rs
//! Concrete collaborator implementations: Telegram Bot API feed, OpenAI
//! analyzer, Discord webhook destination.

pub mod discord;
pub mod openai;
pub mod telegram;
