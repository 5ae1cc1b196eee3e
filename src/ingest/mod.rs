pub mod extract;
pub mod hasher;
pub mod sampler;
pub mod scanner;
