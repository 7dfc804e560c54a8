pub mod module;
pub mod question;

pub use module::{BuildOptions, Module, ModuleDefinition, OutputFormat, OutputSpec};
pub use question::{Question, QuestionDefinition, QuestionType};
