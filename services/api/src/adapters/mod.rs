pub mod db;
pub mod parser_llm;

pub use db::PgStore;
pub use parser_llm::OpenAiWorkoutParser;
