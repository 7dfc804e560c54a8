#![allow(missing_docs)]

pub mod answers;
pub mod answers_schema;
pub mod config;
pub mod error;
pub mod expr;
pub mod markdown;
pub mod provider;
pub mod resolver;
pub mod spec;
pub mod template;
pub mod validate;

pub use answers::{
    Answers, ValidationError, ValidationResult, answers_from_value, answers_to_value,
};
pub use answers_schema::{definition_schema, generate as answers_schema};
pub use config::EngineConfig;
pub use error::{EvaluationError, ModuleError, RenderError};
pub use expr::{Evaluator, Expr, ExprError, ExprEvaluator, Operand};
pub use markdown::{CommonMarkConverter, RichTextConverter};
pub use provider::{
    DefinitionProvider, DirectoryProvider, ProviderError, answerable_modules, load_module,
};
pub use resolver::{Progress, Resolver, next_question, render_output};
pub use spec::{
    BuildOptions, Module, ModuleDefinition, OutputFormat, OutputSpec, Question,
    QuestionDefinition, QuestionType,
};
pub use template::{
    HandlebarsTemplater, TemplateError, Templater, TemplaterConfig, register_default_helpers,
};
pub use validate::{validate, validate_answer};
