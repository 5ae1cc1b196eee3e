pub mod analyzer;
pub mod encode;
pub mod openai;
pub mod remote;
