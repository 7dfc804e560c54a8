//! JSON-in, JSON-out entry points for web views driving a guided module.
//!
//! Every function takes the module id the caller expects, a config document
//! carrying the module definition, and the caller's answers. Failures are
//! reported as `{"error": "..."}` rather than panics.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use guide_spec::{
    Answers, EngineConfig, EvaluationError, Module, ModuleDefinition, ModuleError, Question,
    RenderError, Resolver, ValidationResult, answers_to_value, validate_answer,
};

const DEFAULT_MODULE: &str = include_str!("../../guide-spec/tests/fixtures/linear_chain.json");

#[derive(Debug, Error)]
enum SessionError {
    #[error("failed to parse {0}: {1}")]
    Parse(&'static str, #[source] serde_json::Error),
    #[error("module '{0}' is not available")]
    ModuleUnavailable(String),
    #[error("invalid module definition: {0}")]
    Module(#[from] ModuleError),
    #[error("question '{0}' is not part of this module")]
    UnknownQuestion(String),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct SessionConfig {
    #[serde(default)]
    module: Option<ModuleDefinition>,
    #[serde(default)]
    engine: EngineConfig,
}

struct Loaded {
    module: Module,
    resolver: Resolver,
}

fn load_config(config_json: &str) -> Result<SessionConfig, SessionError> {
    if config_json.trim().is_empty() {
        Ok(SessionConfig::default())
    } else {
        serde_json::from_str(config_json).map_err(|err| SessionError::Parse("config", err))
    }
}

fn ensure_module(module_id: &str, config_json: &str) -> Result<Loaded, SessionError> {
    let config = load_config(config_json)?;
    let definition = match config.module {
        Some(definition) => definition,
        None => serde_json::from_str(DEFAULT_MODULE)
            .map_err(|err| SessionError::Parse("default module", err))?,
    };
    if definition.id != module_id {
        return Err(SessionError::ModuleUnavailable(module_id.to_string()));
    }
    let module = Module::build_with(definition, &config.engine.build)?;
    Ok(Loaded {
        module,
        resolver: Resolver::from_config(&config.engine),
    })
}

fn parse_answers(answers_json: &str) -> Result<Answers, SessionError> {
    if answers_json.trim().is_empty() {
        return Ok(Answers::new());
    }
    serde_json::from_str(answers_json).map_err(|err| SessionError::Parse("answers", err))
}

fn respond(result: Result<Value, SessionError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn question_summary(module: &Module, question: &Question) -> Value {
    let depends_on: Vec<&str> = module.prerequisites(question).map(Question::id).collect();
    let mut map = Map::new();
    map.insert("id".into(), Value::String(question.id().to_string()));
    map.insert("title".into(), Value::String(question.title().to_string()));
    map.insert(
        "type".into(),
        Value::String(question.kind().as_str().to_string()),
    );
    map.insert("depends_on".into(), json!(depends_on));
    if !question.choices().is_empty() {
        map.insert("choices".into(), json!(question.choices()));
    }
    if !question.skip_conditions().is_empty() {
        map.insert(
            "skip_conditions".into(),
            Value::from(question.skip_conditions().len()),
        );
    }
    Value::Object(map)
}

/// Summary of the built module: questions with resolved prerequisites.
pub fn describe(module_id: &str, config_json: &str) -> String {
    respond(ensure_module(module_id, config_json).map(|loaded| {
        let module = &loaded.module;
        let questions = module
            .questions()
            .iter()
            .map(|question| question_summary(module, question))
            .collect::<Vec<_>>();
        json!({
            "id": module.id(),
            "title": module.title(),
            "description": module.description(),
            "answerable_in_context": module.is_answerable_in_context(),
            "output_format": module.output().format.as_str(),
            "questions": questions,
        })
    }))
}

fn next_state(loaded: &Loaded, answers: &Answers) -> Result<Value, SessionError> {
    let Loaded { module, resolver } = loaded;
    let next = resolver.next_question(module, answers)?;
    let progress = resolver.progress(module, answers)?;
    let next_question = match next {
        Some(question) => {
            let prompt = resolver.render_prompt(question, answers)?;
            json!({
                "id": question.id(),
                "title": question.title(),
                "prompt": prompt,
                "type": question.kind().as_str(),
                "choices": question.choices(),
                "required": question.is_required(),
                "help": question.help(),
            })
        }
        None => Value::Null,
    };
    Ok(json!({
        "status": if next.is_some() { "need_input" } else { "complete" },
        "next_question": next_question,
        "progress": {
            "answered": progress.answered,
            "total": progress.total,
        },
    }))
}

/// The next question to present, with progress counters.
pub fn next(module_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(ensure_module(module_id, config_json).and_then(|loaded| {
        let answers = parse_answers(answers_json)?;
        next_state(&loaded, &answers)
    }))
}

fn build_error_response(
    answers: &Answers,
    validation: &ValidationResult,
) -> Result<Value, SessionError> {
    let validation_value = serde_json::to_value(validation).map_err(SessionError::JsonEncode)?;
    Ok(json!({
        "status": "error",
        "answers": answers_to_value(answers),
        "validation": validation_value,
    }))
}

/// Validates and stores one answer, then reports what to ask next.
pub fn submit_patch(
    module_id: &str,
    config_json: &str,
    answers_json: &str,
    question_id: &str,
    value_json: &str,
) -> String {
    respond(ensure_module(module_id, config_json).and_then(|loaded| {
        let question = loaded
            .module
            .question(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
        let value: Value =
            serde_json::from_str(value_json).map_err(|err| SessionError::Parse("answer", err))?;
        let mut answers = parse_answers(answers_json)?;

        if let Some(error) = validate_answer(question, &value) {
            let validation = ValidationResult {
                valid: false,
                errors: vec![error],
                unknown_fields: Vec::new(),
            };
            return build_error_response(&answers, &validation);
        }

        debug!(module = module_id, question = question_id, "accepted answer");
        answers.insert(question_id.to_string(), value);
        let mut response = next_state(&loaded, &answers)?;
        if let Some(map) = response.as_object_mut() {
            map.insert("answers".into(), answers_to_value(&answers));
        }
        Ok(response)
    }))
}

/// Renders the final document once no question is left.
pub fn render(module_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(ensure_module(module_id, config_json).and_then(|loaded| {
        let answers = parse_answers(answers_json)?;
        let Loaded { module, resolver } = &loaded;
        if let Some(question) = resolver.next_question(module, &answers)? {
            return Ok(json!({
                "status": "need_input",
                "next_question_id": question.id(),
            }));
        }
        let document = resolver.render_output(module, &answers)?;
        Ok(json!({
            "status": "complete",
            "format": module.output().format.as_str(),
            "document": document,
        }))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(response: &str) -> Value {
        serde_json::from_str(response).expect("json")
    }

    fn config(module: Value) -> String {
        json!({ "module": module }).to_string()
    }

    #[test]
    fn describe_lists_resolved_prerequisites() {
        let value = parsed(&describe("linear_chain", ""));
        assert_eq!(value["id"], "linear_chain");
        assert_eq!(value["questions"][1]["depends_on"], json!(["q1"]));
        assert_eq!(value["questions"][0]["depends_on"], json!([]));
    }

    #[test]
    fn wrong_module_id_is_an_error() {
        let value = parsed(&next("other", "", "{}"));
        assert_eq!(value["error"], "module 'other' is not available");
    }

    #[test]
    fn next_returns_prompt_and_progress() {
        let value = parsed(&next("linear_chain", "", r#"{"q1": "Payroll"}"#));
        assert_eq!(value["status"], "need_input");
        assert_eq!(value["next_question"]["id"], "q2");
        assert_eq!(value["next_question"]["prompt"], "Who owns Payroll?");
        assert_eq!(value["progress"]["answered"], 1);
        assert_eq!(value["progress"]["total"], 3);
    }

    #[test]
    fn submit_patch_advances() {
        let value = parsed(&submit_patch("linear_chain", "", "{}", "q1", r#""Payroll""#));
        assert_eq!(value["status"], "need_input");
        assert_eq!(value["next_question"]["id"], "q2");
        assert_eq!(value["answers"]["q1"], "Payroll");
    }

    #[test]
    fn submit_patch_rejects_invalid_choice() {
        let answers = r#"{"q1": "Payroll", "q2": "Finance"}"#;
        let value = parsed(&submit_patch("linear_chain", "", answers, "q3", r#""mars""#));
        assert_eq!(value["status"], "error");
        assert_eq!(value["validation"]["errors"][0]["code"], "choice_mismatch");
        assert!(value["answers"].get("q3").is_none());
    }

    #[test]
    fn submit_patch_rejects_unknown_question() {
        let value = parsed(&submit_patch("linear_chain", "", "{}", "q7", "1"));
        assert_eq!(value["error"], "question 'q7' is not part of this module");
    }

    #[test]
    fn render_waits_for_completion() {
        let value = parsed(&render("linear_chain", "", r#"{"q1": "Payroll"}"#));
        assert_eq!(value["status"], "need_input");
        assert_eq!(value["next_question_id"], "q2");
    }

    #[test]
    fn render_produces_document() {
        let answers = r#"{"q1": "Payroll", "q2": "Finance", "q3": "cloud"}"#;
        let value = parsed(&render("linear_chain", "", answers));
        assert_eq!(value["status"], "complete");
        assert_eq!(value["format"], "text");
        assert_eq!(
            value["document"],
            "Payroll is owned by Finance and hosted cloud."
        );
    }

    #[test]
    fn invalid_definition_reports_construction_error() {
        let module = json!({
            "id": "broken",
            "title": "Broken",
            "questions": [
                { "id": "q1", "title": "Q1", "type": "text", "depends_on": ["q2"] },
                { "id": "q2", "title": "Q2", "type": "text", "depends_on": [] }
            ],
            "output": { "template": "{{q1}}" }
        });
        let value = parsed(&describe("broken", &config(module.clone())));
        assert!(
            value["error"]
                .as_str()
                .is_some_and(|error| error.contains("unknown question 'q2'"))
        );

        let relaxed = json!({
            "module": module,
            "engine": { "build": { "allow_forward_references": true } }
        });
        let value = parsed(&describe("broken", &relaxed.to_string()));
        assert_eq!(value["questions"][0]["depends_on"], json!(["q2"]));
    }

    #[test]
    fn forward_reference_against_implicit_edge_is_a_cycle() {
        let config = json!({
            "module": {
                "id": "looped",
                "title": "Looped",
                "questions": [
                    { "id": "q1", "title": "Q1", "type": "text", "depends_on": ["q2"] },
                    { "id": "q2", "title": "Q2", "type": "text" }
                ],
                "output": { "template": "{{q1}}" }
            },
            "engine": { "build": { "allow_forward_references": true } }
        });
        let value = parsed(&describe("looped", &config.to_string()));
        assert_eq!(
            value["error"],
            "invalid module definition: circular dependency: q1 -> q2 -> q1"
        );
    }

    #[test]
    fn malformed_answers_are_rejected_not_dropped() {
        let value = parsed(&submit_patch(
            "linear_chain",
            "",
            r#"{"q1": "Payroll","#,
            "q2",
            r#""Finance""#,
        ));
        assert!(
            value["error"]
                .as_str()
                .is_some_and(|error| error.starts_with("failed to parse answers"))
        );
        assert!(value.get("answers").is_none());

        let value = parsed(&next("linear_chain", "", "[1, 2]"));
        assert!(
            value["error"]
                .as_str()
                .is_some_and(|error| error.starts_with("failed to parse answers"))
        );
    }

    #[test]
    fn empty_answers_document_starts_a_session() {
        let value = parsed(&next("linear_chain", "", ""));
        assert_eq!(value["next_question"]["id"], "q1");
    }

    #[test]
    fn strict_templates_fail_on_missing_values() {
        let module = json!({
            "id": "strict",
            "title": "Strict",
            "questions": [
                { "id": "q1", "title": "Q1", "type": "text" },
                {
                    "id": "q2", "title": "Q2", "type": "text",
                    "skip_if": [{ "op": "literal_bool", "value": true }]
                }
            ],
            "output": { "template": "{{q1}} {{q2}}" }
        });
        let config = json!({ "module": module, "engine": { "templates": { "strict": true } } });
        let value = parsed(&render("strict", &config.to_string(), r#"{"q1": "x"}"#));
        assert!(
            value["error"]
                .as_str()
                .is_some_and(|error| error.contains("failed to render output"))
        );
    }
}
