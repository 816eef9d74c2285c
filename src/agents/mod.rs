pub mod agenda;
pub mod gemini;
pub mod summarizer;
