//! Mindmap graph mutations: validation, persistence and room broadcast

pub mod manager;
pub mod models;

pub use manager::MindmapManager;
pub use models::*;
