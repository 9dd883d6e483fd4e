pub mod calculator;
pub mod crypto;
pub mod editor;
pub mod gemini;
pub mod merge;
pub mod processor;
pub mod render;
pub mod state;
pub mod store;
pub mod zatca;
