//! Picks the next question to ask and renders a module's final document.
//!
//! The resolver walks the dependency graph backwards from the questions the
//! output template actually uses, so a question nothing in the output
//! depends on is never asked.

use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::answers::Answers;
use crate::config::EngineConfig;
use crate::error::{EvaluationError, RenderError, fragment};
use crate::expr::{Evaluator, ExprEvaluator};
use crate::markdown::{CommonMarkConverter, RichTextConverter};
use crate::spec::{Module, OutputFormat, Question};
use crate::template::{HandlebarsTemplater, Templater};

/// Resolved versus relevant question counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

/// Stateless resolver over injected evaluation, templating and conversion ports.
#[derive(Debug, Clone, Default)]
pub struct Resolver<E = ExprEvaluator, T = HandlebarsTemplater, C = CommonMarkConverter> {
    evaluator: E,
    templater: T,
    converter: C,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_ports(
            ExprEvaluator,
            HandlebarsTemplater::new(config.templates),
            CommonMarkConverter,
        )
    }
}

impl<E, T, C> Resolver<E, T, C>
where
    E: Evaluator,
    T: Templater,
    C: RichTextConverter,
{
    pub fn with_ports(evaluator: E, templater: T, converter: C) -> Self {
        Self {
            evaluator,
            templater,
            converter,
        }
    }

    /// Questions the output template references, in definition order.
    pub fn referenced_questions<'m>(
        &self,
        module: &'m Module,
    ) -> Result<Vec<&'m Question>, EvaluationError> {
        let template = &module.output().template;
        let names = self
            .templater
            .referenced_variables(template)
            .map_err(|source| EvaluationError::TemplateVariables {
                fragment: fragment(template),
                source,
            })?;
        Ok(module
            .questions()
            .iter()
            .filter(|question| names.contains(question.id()))
            .collect())
    }

    /// True when any skip condition holds; the first true condition wins.
    pub fn should_skip(
        &self,
        question: &Question,
        answers: &Answers,
    ) -> Result<bool, EvaluationError> {
        for (index, condition) in question.skip_conditions().iter().enumerate() {
            let skip = self
                .evaluator
                .evaluate(condition, answers)
                .map_err(|source| EvaluationError::SkipCondition {
                    question: question.id().to_string(),
                    index,
                    source,
                })?;
            if skip {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Answered directly, or skipped by one of its conditions.
    pub fn is_answered(
        &self,
        question: &Question,
        answers: &Answers,
    ) -> Result<bool, EvaluationError> {
        if answers.contains_key(question.id()) {
            return Ok(true);
        }
        self.should_skip(question, answers)
    }

    /// The next question to present, or `None` once the module is complete.
    pub fn next_question<'m>(
        &self,
        module: &'m Module,
        answers: &Answers,
    ) -> Result<Option<&'m Question>, EvaluationError> {
        let mut needs_answer: VecDeque<&Question> =
            self.referenced_questions(module)?.into_iter().collect();
        let mut processed = HashSet::new();
        let mut candidates = Vec::new();

        while let Some(question) = needs_answer.pop_front() {
            if processed.contains(&question.definition_index())
                || self.is_answered(question, answers)?
            {
                continue;
            }
            processed.insert(question.definition_index());

            let mut unresolved = Vec::new();
            for prerequisite in module.prerequisites(question) {
                if !self.is_answered(prerequisite, answers)? {
                    unresolved.push(prerequisite);
                }
            }
            trace!(
                question = question.id(),
                unresolved = unresolved.len(),
                "expanded question"
            );

            if unresolved.is_empty() {
                candidates.push(question);
            } else {
                needs_answer.extend(unresolved);
            }
        }

        let next = candidates
            .into_iter()
            .min_by_key(|question| question.definition_index());
        debug!(
            module = module.id(),
            next = next.map(Question::id),
            "resolved next question"
        );
        Ok(next)
    }

    /// Renders the module output, dropping answers whose questions are now skipped.
    pub fn render_output(&self, module: &Module, answers: &Answers) -> Result<String, RenderError> {
        let mut cleaned = answers.clone();
        for question in module.questions() {
            if cleaned.contains_key(question.id()) && self.should_skip(question, &cleaned)? {
                debug!(
                    module = module.id(),
                    question = question.id(),
                    "dropping answer of skipped question"
                );
                cleaned.remove(question.id());
            }
        }

        let output = module.output();
        let rendered = self
            .templater
            .render(&output.template, &cleaned, output.format)
            .map_err(|source| RenderError::Output {
                module: module.id().to_string(),
                source,
            })?;

        if output.format.is_rich() {
            Ok(self.converter.convert(&rendered))
        } else {
            Ok(rendered)
        }
    }

    /// Renders a question's prompt against the answers given so far.
    pub fn render_prompt(
        &self,
        question: &Question,
        answers: &Answers,
    ) -> Result<String, RenderError> {
        self.templater
            .render(question.prompt_template(), answers, OutputFormat::Text)
            .map_err(|source| RenderError::Prompt {
                question: question.id().to_string(),
                source,
            })
    }

    /// Counts resolved questions among those the output can depend on.
    pub fn progress(&self, module: &Module, answers: &Answers) -> Result<Progress, EvaluationError> {
        let mut relevant = BTreeSet::new();
        let mut queue: VecDeque<&Question> =
            self.referenced_questions(module)?.into_iter().collect();
        while let Some(question) = queue.pop_front() {
            if relevant.insert(question.definition_index()) {
                queue.extend(module.prerequisites(question));
            }
        }

        let mut answered = 0;
        for index in &relevant {
            if self.is_answered(&module.questions()[*index], answers)? {
                answered += 1;
            }
        }
        Ok(Progress {
            answered,
            total: relevant.len(),
        })
    }
}

/// [`Resolver::next_question`] with the default ports.
pub fn next_question<'m>(
    module: &'m Module,
    answers: &Answers,
) -> Result<Option<&'m Question>, EvaluationError> {
    Resolver::new().next_question(module, answers)
}

/// [`Resolver::render_output`] with the default ports.
pub fn render_output(module: &Module, answers: &Answers) -> Result<String, RenderError> {
    Resolver::new().render_output(module, answers)
}
