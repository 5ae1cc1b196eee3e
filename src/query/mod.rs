pub mod answerer;
pub mod context;
pub mod search;
