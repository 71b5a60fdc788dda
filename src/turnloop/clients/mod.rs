pub mod claude;
pub mod common;
pub mod openai;
