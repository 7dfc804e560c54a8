use std::io::{self, BufRead, Write};

use serde_json::{Number, Value};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: question prompts only.
    Clean,
    /// Verbose output: progress, help text, choices and error details.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// The question the session asked for, as shown to the user.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub id: String,
    pub title: String,
    pub prompt: String,
    pub kind: String,
    pub choices: Vec<String>,
    pub required: bool,
    pub help: Option<String>,
    pub answered: u64,
    pub total: u64,
}

impl PromptContext {
    /// Builds the prompt from a session `next` payload.
    pub fn from_payload(payload: &Value) -> Result<Self, String> {
        let question = payload
            .get("next_question")
            .filter(|question| question.is_object())
            .ok_or_else(|| "session payload has no next_question".to_string())?;
        let text = |key: &str| {
            question
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let id = text("id").ok_or_else(|| "next_question is missing an id".to_string())?;
        let progress = |key: &str| {
            payload
                .get("progress")
                .and_then(|progress| progress.get(key))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };
        Ok(Self {
            title: text("title").unwrap_or_else(|| id.clone()),
            prompt: text("prompt").unwrap_or_default(),
            kind: text("type").unwrap_or_else(|| "text".into()),
            choices: question
                .get("choices")
                .and_then(Value::as_array)
                .map(|choices| {
                    choices
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            required: question
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            help: text("help"),
            answered: progress("answered"),
            total: progress("total"),
            id,
        })
    }
}

/// Why a typed answer was rejected before reaching validation.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Prints prompts and results for the interactive wizard.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, title: &str, description: Option<&str>) {
        if self.header_printed {
            return;
        }
        println!("Module: {}", title);
        if self.verbosity.is_verbose()
            && let Some(description) = description
        {
            println!("{}", description);
        }
        self.header_printed = true;
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.answered + 1, prompt.total, prompt.title)
        } else {
            prompt.title.clone()
        };
        if prompt.required {
            line.push_str(" *");
        }
        println!("{}", line);
        if !prompt.prompt.is_empty() {
            println!("{}", prompt.prompt);
        }
        if self.verbosity.is_verbose()
            && let Some(help) = &prompt.help
        {
            println!("Help: {}", help);
        }
        if !prompt.choices.is_empty() {
            println!("Choices: {}", prompt.choices.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_validation(&self, validation: &Value) {
        let errors = validation
            .get("errors")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for error in errors {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("invalid answer");
            match error.get("code").and_then(Value::as_str) {
                Some(code) if self.verbosity.is_verbose() => {
                    eprintln!("Invalid answer: {} ({})", message, code)
                }
                _ => eprintln!("Invalid answer: {}", message),
            }
        }
    }

    pub fn show_completion(&self, document: &str, answers: &Value) {
        println!("Done ✅");
        println!("{}", document);
        if self.show_answers_json {
            match serde_json::to_string_pretty(answers) {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize answers to JSON: {}", err),
            }
        }
    }
}

/// Reads one answer, re-prompting until it parses. `exit` aborts the wizard.
pub fn prompt_question(
    prompt: &PromptContext,
    presenter: &WizardPresenter,
    input: &mut dyn BufRead,
) -> Result<Value, Box<dyn std::error::Error>> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err("input closed before the module was complete".into());
        }

        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("wizard aborted by user".into());
        }

        match parse_answer(prompt, trimmed) {
            Ok(value) => return Ok(value),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

pub fn parse_answer(prompt: &PromptContext, raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if !prompt.required {
            return Ok(Value::Null);
        }
        return Err(AnswerParseError::new(
            "This question requires an answer.",
            None,
        ));
    }

    match prompt.kind.as_str() {
        "yesno" => parse_boolean(raw),
        "integer" => parse_integer(raw),
        "real" => parse_number(raw),
        "choice" => parse_choice(&prompt.choices, raw).map(Value::String),
        "multiple_choice" => raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| parse_choice(&prompt.choices, item).map(Value::String))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn parse_boolean(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_integer(raw: &str) -> Result<Value, AnswerParseError> {
    raw.parse::<i64>()
        .map(Number::from)
        .map(Value::Number)
        .map_err(|_| {
            AnswerParseError::new(
                "Please enter a whole number.",
                Some("expected integer".to_string()),
            )
        })
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    raw.parse::<f64>()
        .map_err(|_| {
            AnswerParseError::new(
                "Please enter a number.",
                Some("expected number".to_string()),
            )
        })
        .and_then(|value| {
            Number::from_f64(value).map(Value::Number).ok_or_else(|| {
                AnswerParseError::new(
                    "Please enter a finite number.",
                    Some("number must be finite".to_string()),
                )
            })
        })
}

/// Accepts a choice by (case-insensitive) value or by its 1-based position.
fn parse_choice(choices: &[String], raw: &str) -> Result<String, AnswerParseError> {
    if let Some(choice) = choices
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(raw))
    {
        return Ok(choice.clone());
    }
    if let Ok(position) = raw.parse::<usize>()
        && let Some(choice) = position.checked_sub(1).and_then(|index| choices.get(index))
    {
        return Ok(choice.clone());
    }
    Err(AnswerParseError::new(
        format!("Choose one of: {}.", choices.join(", ")),
        Some(format!("allowed values: {}", choices.join(", "))),
    ))
}
