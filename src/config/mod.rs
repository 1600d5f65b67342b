// src/config/mod.rs
pub mod ai;
pub mod app;
pub mod catalog;

pub use ai::AiConfig;
pub use app::AppConfig;
pub use catalog::{Catalog, StaticCatalog};
