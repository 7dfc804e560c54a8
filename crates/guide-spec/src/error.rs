use thiserror::Error;

use crate::expr::ExprError;
use crate::template::TemplateError;

/// Definition-authoring mistakes caught while building a module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("question '{question}' depends on unknown question '{dependency}'")]
    UnknownDependency { question: String, dependency: String },
    #[error("question id '{0}' is defined more than once")]
    DuplicateQuestion(String),
    #[error("circular dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
    #[error("question '{question}' has an invalid pattern: {message}")]
    InvalidPattern { question: String, message: String },
}

/// A skip condition or template scan failed while choosing the next question.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("skip condition #{index} of question '{question}' failed: {source}")]
    SkipCondition {
        question: String,
        index: usize,
        #[source]
        source: ExprError,
    },
    #[error("cannot read variables of template '{fragment}': {source}")]
    TemplateVariables {
        fragment: String,
        #[source]
        source: TemplateError,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to render output of module '{module}': {source}")]
    Output {
        module: String,
        #[source]
        source: TemplateError,
    },
    #[error("failed to render prompt of question '{question}': {source}")]
    Prompt {
        question: String,
        #[source]
        source: TemplateError,
    },
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Leading part of a template, for error messages.
pub(crate) fn fragment(template: &str) -> String {
    const LIMIT: usize = 60;
    match template.char_indices().nth(LIMIT) {
        Some((end, _)) => format!("{}...", &template[..end]),
        None => template.to_string(),
    }
}
