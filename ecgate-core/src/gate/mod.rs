pub mod evaluator;
pub mod gadgets;
pub mod layout;
pub mod synthesizer;
