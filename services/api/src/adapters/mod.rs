pub mod db;
pub mod generator_llm;
pub mod session_file;
pub mod tutor_llm;

pub use db::DbAdapter;
pub use generator_llm::OpenAiGeneratorAdapter;
pub use session_file::FileSessionFlag;
pub use tutor_llm::OpenAiTutorAdapter;
