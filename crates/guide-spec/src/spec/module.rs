use std::collections::HashMap;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModuleError;
use crate::spec::question::{Question, QuestionDefinition};

/// How the rendered output template is post-processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    /// Rendered text is converted from markdown to HTML.
    Markdown,
    /// Template output is already HTML; substituted values are escaped.
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
        }
    }

    pub fn is_rich(&self) -> bool {
        matches!(self, OutputFormat::Markdown)
    }
}

/// Final document template of a module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct OutputSpec {
    #[serde(default)]
    pub format: OutputFormat,
    pub template: String,
}

/// Module definition as handed over by a definition provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub answerable_in_context: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionDefinition>,
    pub output: OutputSpec,
}

/// Knobs applied while turning a [`ModuleDefinition`] into a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BuildOptions {
    /// Let `depends_on` name questions defined later in the module.
    pub allow_forward_references: bool,
}

/// An immutable, validated questionnaire.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    id: String,
    title: String,
    is_answerable_in_context: bool,
    description: Option<String>,
    questions: Vec<Question>,
    index: HashMap<String, usize>,
    output: OutputSpec,
}

impl Module {
    /// Builds a module with the default [`BuildOptions`].
    pub fn build(definition: ModuleDefinition) -> Result<Self, ModuleError> {
        Self::build_with(definition, &BuildOptions::default())
    }

    pub fn build_with(
        definition: ModuleDefinition,
        options: &BuildOptions,
    ) -> Result<Self, ModuleError> {
        let mut index = HashMap::with_capacity(definition.questions.len());
        for (position, question) in definition.questions.iter().enumerate() {
            if index.insert(question.id.clone(), position).is_some() {
                return Err(ModuleError::DuplicateQuestion(question.id.clone()));
            }
        }

        let mut questions = Vec::with_capacity(definition.questions.len());
        for (position, question) in definition.questions.into_iter().enumerate() {
            if let Some(pattern) = &question.pattern
                && let Err(err) = Regex::new(pattern)
            {
                return Err(ModuleError::InvalidPattern {
                    question: question.id,
                    message: err.to_string(),
                });
            }
            let depends_on = match &question.depends_on {
                Some(ids) => resolve_explicit(&question.id, ids, position, &index, options)?,
                None if position == 0 => Vec::new(),
                None => vec![position - 1],
            };
            questions.push(Question {
                id: question.id,
                title: question.title,
                prompt: question.prompt,
                kind: question.kind,
                choices: question.choices,
                skip_conditions: question.skip_if,
                depends_on,
                definition_index: position,
                required: question.required,
                help: question.help,
                pattern: question.pattern,
            });
        }

        check_cycles(&questions)?;

        let edges: usize = questions.iter().map(|q| q.depends_on.len()).sum();
        debug!(
            module = %definition.id,
            questions = questions.len(),
            edges,
            "built module"
        );

        Ok(Self {
            id: definition.id,
            title: definition.title,
            is_answerable_in_context: definition.answerable_in_context,
            description: definition.description,
            questions,
            index,
            output: definition.output,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_answerable_in_context(&self) -> bool {
        self.is_answerable_in_context
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Questions in definition order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.index.get(id).map(|position| &self.questions[*position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn output(&self) -> &OutputSpec {
        &self.output
    }

    /// Questions that must be resolved before `question` can be asked.
    pub fn prerequisites<'a>(
        &'a self,
        question: &'a Question,
    ) -> impl Iterator<Item = &'a Question> + 'a {
        question
            .depends_on
            .iter()
            .map(move |position| &self.questions[*position])
    }
}

fn resolve_explicit(
    question: &str,
    ids: &[String],
    position: usize,
    index: &HashMap<String, usize>,
    options: &BuildOptions,
) -> Result<Vec<usize>, ModuleError> {
    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        let target = index
            .get(id)
            .copied()
            .filter(|target| options.allow_forward_references || *target < position)
            .ok_or_else(|| ModuleError::UnknownDependency {
                question: question.to_string(),
                dependency: id.clone(),
            })?;
        resolved.push(target);
    }
    resolved.sort_unstable();
    resolved.dedup();
    Ok(resolved)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

fn check_cycles(questions: &[Question]) -> Result<(), ModuleError> {
    let mut marks = vec![Mark::Unvisited; questions.len()];
    let mut path = Vec::new();
    for start in 0..questions.len() {
        if marks[start] == Mark::Unvisited {
            visit(start, questions, &mut marks, &mut path)?;
        }
    }
    Ok(())
}

fn visit(
    node: usize,
    questions: &[Question],
    marks: &mut [Mark],
    path: &mut Vec<usize>,
) -> Result<(), ModuleError> {
    marks[node] = Mark::InProgress;
    path.push(node);
    for &next in &questions[node].depends_on {
        match marks[next] {
            Mark::Done => {}
            Mark::Unvisited => visit(next, questions, marks, path)?,
            Mark::InProgress => {
                let start = path.iter().position(|p| *p == next).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..]
                    .iter()
                    .map(|p| questions[*p].id.clone())
                    .collect();
                cycle.push(questions[next].id.clone());
                return Err(ModuleError::CyclicDependency { cycle });
            }
        }
    }
    path.pop();
    marks[node] = Mark::Done;
    Ok(())
}
