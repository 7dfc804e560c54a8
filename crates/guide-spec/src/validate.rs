use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::answers::{Answers, ValidationError, ValidationResult};
use crate::spec::{Module, Question, QuestionType};

/// Checks caller-supplied answers against their questions' types and choices.
pub fn validate(module: &Module, answers: &Answers) -> ValidationResult {
    let mut errors = Vec::new();
    let mut unknown_fields = Vec::new();

    for (id, value) in answers {
        match module.question(id) {
            Some(question) => {
                if let Some(error) = validate_answer(question, value) {
                    errors.push(error);
                }
            }
            None => unknown_fields.push(id.clone()),
        }
    }

    ValidationResult {
        valid: errors.is_empty() && unknown_fields.is_empty(),
        errors,
        unknown_fields,
    }
}

/// Validates a single answer; `None` means it is acceptable.
pub fn validate_answer(question: &Question, value: &Value) -> Option<ValidationError> {
    if value.is_null() {
        return if question.is_required() {
            Some(base_error(question, "an answer is required", "required"))
        } else {
            None
        };
    }

    if !matches_type(question.kind(), value) {
        return Some(base_error(question, "type mismatch", "type_mismatch"));
    }

    if question.kind().uses_choices() && !question.choices().is_empty() {
        let selected: Vec<&str> = match value {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            other => other.as_str().into_iter().collect(),
        };
        if selected
            .iter()
            .any(|choice| !question.choices().iter().any(|allowed| allowed == choice))
        {
            return Some(base_error(question, "invalid choice", "choice_mismatch"));
        }
    }

    if matches!(question.kind(), QuestionType::Email)
        && let Some(text) = value.as_str()
        && !EMAIL.is_match(text)
    {
        return Some(base_error(question, "not an email address", "email"));
    }

    if let Some(pattern) = question.pattern()
        && let Some(text) = value.as_str()
        && let Ok(regex) = Regex::new(pattern)
        && !regex.is_match(text)
    {
        return Some(base_error(
            question,
            "value does not match pattern",
            "pattern_mismatch",
        ));
    }

    None
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("email pattern compiles")
});

fn matches_type(kind: QuestionType, value: &Value) -> bool {
    match kind {
        QuestionType::Text
        | QuestionType::Longtext
        | QuestionType::Choice
        | QuestionType::Date
        | QuestionType::Email
        | QuestionType::Url => value.is_string(),
        QuestionType::MultipleChoice => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        QuestionType::Yesno => value.is_boolean(),
        QuestionType::Integer => value.is_i64() || value.is_u64(),
        QuestionType::Real => value.is_number(),
    }
}

fn base_error(question: &Question, message: &str, code: &str) -> ValidationError {
    ValidationError {
        question_id: Some(question.id().to_string()),
        path: Some(format!("/{}", question.id())),
        message: message.into(),
        code: Some(code.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::answers_from_value;
    use crate::spec::{ModuleDefinition, OutputSpec, QuestionDefinition};
    use serde_json::json;

    fn module() -> Module {
        Module::build(ModuleDefinition {
            id: "v".into(),
            title: "V".into(),
            answerable_in_context: false,
            description: None,
            questions: vec![
                QuestionDefinition::new("name", QuestionType::Text),
                QuestionDefinition::new("level", QuestionType::Choice)
                    .with_choices(["low", "high"]),
                QuestionDefinition::new("tags", QuestionType::MultipleChoice)
                    .with_choices(["pii", "phi"]),
                QuestionDefinition::new("count", QuestionType::Integer),
                QuestionDefinition::new("contact", QuestionType::Email),
                QuestionDefinition::new("code", QuestionType::Text).with_pattern(r"^[A-Z]{3}-\d+$"),
            ],
            output: OutputSpec::default(),
        })
        .expect("module")
    }

    #[test]
    fn accepts_well_typed_answers() {
        let answers = answers_from_value(&json!({
            "name": "Acme",
            "level": "high",
            "tags": ["pii"],
            "count": 4,
            "contact": "ops@acme.test"
        }));
        let result = validate(&module(), &answers);
        assert!(result.valid, "{result:?}");
    }

    #[test]
    fn reports_type_and_choice_errors() {
        let answers = answers_from_value(&json!({
            "name": 3,
            "level": "medium",
            "tags": ["pii", "pci"],
            "count": 1.5
        }));
        let result = validate(&module(), &answers);
        let codes: Vec<_> = result
            .errors
            .iter()
            .filter_map(|error| error.code.as_deref())
            .collect();
        assert!(!result.valid);
        assert_eq!(
            codes,
            vec!["type_mismatch", "choice_mismatch", "type_mismatch", "choice_mismatch"]
        );
    }

    #[test]
    fn reports_unknown_fields() {
        let answers = answers_from_value(&json!({ "ghost": "boo" }));
        let result = validate(&module(), &answers);
        assert_eq!(result.unknown_fields, vec!["ghost"]);
    }

    #[test]
    fn null_is_only_allowed_for_optional_questions() {
        let module = module();
        let name = module.question("name").expect("name");
        assert_eq!(
            validate_answer(name, &Value::Null).and_then(|error| error.code),
            Some("required".to_string())
        );
    }

    #[test]
    fn email_needs_at_sign_and_domain() {
        let module = module();
        let contact = module.question("contact").expect("contact");
        assert!(validate_answer(contact, &json!("nobody")).is_some());
        assert!(validate_answer(contact, &json!("two@@signs.test")).is_some());
        assert!(validate_answer(contact, &json!("spaced out@acme.test")).is_some());
        assert!(validate_answer(contact, &json!("ops@acme")).is_some());
        assert!(validate_answer(contact, &json!("a@b.c")).is_none());
    }

    #[test]
    fn text_answers_must_match_the_question_pattern() {
        let module = module();
        let code = module.question("code").expect("code");
        assert!(validate_answer(code, &json!("ACM-42")).is_none());
        assert_eq!(
            validate_answer(code, &json!("acm-42")).and_then(|error| error.code),
            Some("pattern_mismatch".to_string())
        );
    }
}
