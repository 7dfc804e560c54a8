use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// Kind of answer a question collects. The resolver never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Longtext,
    Choice,
    MultipleChoice,
    Yesno,
    Integer,
    Real,
    Date,
    Email,
    Url,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Longtext => "longtext",
            QuestionType::Choice => "choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Yesno => "yesno",
            QuestionType::Integer => "integer",
            QuestionType::Real => "real",
            QuestionType::Date => "date",
            QuestionType::Email => "email",
            QuestionType::Url => "url",
        }
    }

    /// Whether answers are picked from the question's `choices`.
    pub fn uses_choices(&self) -> bool {
        matches!(self, QuestionType::Choice | QuestionType::MultipleChoice)
    }
}

fn default_required() -> bool {
    true
}

/// A question as written in a module definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionDefinition {
    pub id: String,
    pub title: String,
    /// Prompt template rendered against the answers collected so far.
    #[serde(default)]
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_if: Vec<Expr>,
    /// `None` falls back to "depends on the previous question".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Regular expression text answers must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl QuestionDefinition {
    pub fn new(id: impl Into<String>, kind: QuestionType) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            prompt: String::new(),
            id,
            kind,
            choices: Vec::new(),
            skip_if: Vec::new(),
            depends_on: None,
            required: true,
            help: None,
            pattern: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_skip_if(mut self, condition: Expr) -> Self {
        self.skip_if.push(condition);
        self
    }

    pub fn with_depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

/// A question inside a built [`crate::Module`].
///
/// Prerequisites are stored as positions in the owning module, so a
/// `Question` is only meaningful together with the module it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) prompt: String,
    pub(crate) kind: QuestionType,
    pub(crate) choices: Vec<String>,
    pub(crate) skip_conditions: Vec<Expr>,
    pub(crate) depends_on: Vec<usize>,
    pub(crate) definition_index: usize,
    pub(crate) required: bool,
    pub(crate) help: Option<String>,
    pub(crate) pattern: Option<String>,
}

impl Question {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn prompt_template(&self) -> &str {
        &self.prompt
    }

    pub fn kind(&self) -> QuestionType {
        self.kind
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn skip_conditions(&self) -> &[Expr] {
        &self.skip_conditions
    }

    /// Module positions of the questions that must be resolved first.
    pub fn depends_on(&self) -> &[usize] {
        &self.depends_on
    }

    pub fn definition_index(&self) -> usize {
        self.definition_index
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }
}
