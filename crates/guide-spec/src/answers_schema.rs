use schemars::schema_for;
use serde_json::{Map, Value, json};

use crate::spec::{Module, ModuleDefinition, Question, QuestionType};

/// JSON Schema for the answers map of `module`.
///
/// Nothing is listed as required: questions may legitimately stay unanswered
/// when a skip condition resolves them.
pub fn generate(module: &Module) -> Value {
    let mut properties = Map::new();
    for question in module.questions() {
        properties.insert(question.id().to_string(), question_schema(question));
    }

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": format!("{} answers", module.title()),
        "type": "object",
        "properties": properties,
        "additionalProperties": false,
    })
}

/// JSON Schema of the module definition format itself.
pub fn definition_schema() -> Result<Value, serde_json::Error> {
    serde_json::to_value(schema_for!(ModuleDefinition))
}

fn question_schema(question: &Question) -> Value {
    let mut schema = match question.kind() {
        QuestionType::Text | QuestionType::Longtext => json!({ "type": "string" }),
        QuestionType::Date => json!({ "type": "string", "format": "date" }),
        QuestionType::Email => json!({ "type": "string", "format": "email" }),
        QuestionType::Url => json!({ "type": "string", "format": "uri" }),
        QuestionType::Yesno => json!({ "type": "boolean" }),
        QuestionType::Integer => json!({ "type": "integer" }),
        QuestionType::Real => json!({ "type": "number" }),
        QuestionType::Choice => choice_schema(question),
        QuestionType::MultipleChoice => json!({
            "type": "array",
            "items": choice_schema(question),
            "uniqueItems": true,
        }),
    };

    if let Some(map) = schema.as_object_mut() {
        map.insert("title".into(), Value::String(question.title().to_string()));
        if let Some(help) = question.help() {
            map.insert("description".into(), Value::String(help.to_string()));
        }
        if let Some(pattern) = question.pattern() {
            map.insert("pattern".into(), Value::String(pattern.to_string()));
        }
        if !question.is_required() {
            allow_null(map);
        }
    }
    schema
}

/// Optional questions accept an explicit `null` answer.
fn allow_null(map: &mut Map<String, Value>) {
    if let Some(kind) = map.remove("type") {
        map.insert("type".into(), json!([kind, "null"]));
    }
    if let Some(Value::Array(allowed)) = map.get_mut("enum") {
        allowed.push(Value::Null);
    }
}

fn choice_schema(question: &Question) -> Value {
    if question.choices().is_empty() {
        json!({ "type": "string" })
    } else {
        json!({ "type": "string", "enum": question.choices() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{OutputSpec, QuestionDefinition};

    #[test]
    fn schema_maps_question_types() {
        let module = Module::build(ModuleDefinition {
            id: "s".into(),
            title: "Systems".into(),
            answerable_in_context: false,
            description: None,
            questions: vec![
                QuestionDefinition::new("hosted", QuestionType::Yesno),
                QuestionDefinition::new("regions", QuestionType::MultipleChoice)
                    .with_choices(["us", "eu"]),
            ],
            output: OutputSpec::default(),
        })
        .expect("module");

        let schema = generate(&module);
        assert_eq!(schema["properties"]["hosted"]["type"], "boolean");
        assert_eq!(schema["properties"]["regions"]["type"], "array");
        assert_eq!(schema["properties"]["regions"]["items"]["enum"][1], "eu");
        assert_eq!(schema["title"], "Systems answers");
    }

    #[test]
    fn optional_questions_accept_null() {
        let module = Module::build(ModuleDefinition {
            id: "s".into(),
            title: "Systems".into(),
            answerable_in_context: false,
            description: None,
            questions: vec![
                QuestionDefinition::new("owner", QuestionType::Text).with_pattern("^[a-z]+$"),
                QuestionDefinition {
                    required: false,
                    ..QuestionDefinition::new("notes", QuestionType::Longtext)
                },
                QuestionDefinition {
                    required: false,
                    ..QuestionDefinition::new("tier", QuestionType::Choice)
                        .with_choices(["gold", "silver"])
                },
            ],
            output: OutputSpec::default(),
        })
        .expect("module");

        let schema = generate(&module);
        assert_eq!(schema["properties"]["owner"]["type"], "string");
        assert_eq!(schema["properties"]["owner"]["pattern"], "^[a-z]+$");
        assert_eq!(
            schema["properties"]["notes"]["type"],
            serde_json::json!(["string", "null"])
        );
        assert_eq!(
            schema["properties"]["tier"]["enum"],
            serde_json::json!(["gold", "silver", null])
        );
    }

    #[test]
    fn definition_schema_describes_questions() {
        let schema = definition_schema().expect("schema");
        assert!(schema["properties"]["questions"].is_object());
    }
}
