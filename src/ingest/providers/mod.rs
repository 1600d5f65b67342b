// src/ingest/providers/mod.rs
pub mod code_host;
pub mod social_news;
pub mod syndication;
