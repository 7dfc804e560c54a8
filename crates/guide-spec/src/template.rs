use std::collections::BTreeSet;

use handlebars::template::{Parameter, Template, TemplateElement};
use handlebars::{Handlebars, Path, PathSeg, handlebars_helper, no_escape};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::answers::Answers;
use crate::spec::OutputFormat;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template syntax error: {0}")]
    Syntax(#[from] handlebars::TemplateError),
    #[error("template render error: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Renders output and prompt templates, and reports which variables they use.
pub trait Templater {
    /// Root names of every variable path referenced by `template`.
    ///
    /// Fails when the template does not parse.
    fn referenced_variables(&self, template: &str) -> Result<BTreeSet<String>, TemplateError>;

    fn render(
        &self,
        template: &str,
        answers: &Answers,
        format: OutputFormat,
    ) -> Result<String, TemplateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TemplaterConfig {
    /// Fail rendering when a template references a missing variable.
    pub strict: bool,
}

handlebars_helper!(join: |items: Json, separator: str| {
    match items {
        Value::Array(values) => values
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(separator),
        Value::Null => String::new(),
        other => display_value(other),
    }
});

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Default [`Templater`] backed by handlebars.
#[derive(Clone)]
pub struct HandlebarsTemplater {
    raw: Handlebars<'static>,
    escaped: Handlebars<'static>,
}

impl HandlebarsTemplater {
    pub fn new(config: TemplaterConfig) -> Self {
        let mut raw = Handlebars::new();
        raw.register_escape_fn(no_escape);
        let mut escaped = Handlebars::new();
        for registry in [&mut raw, &mut escaped] {
            registry.set_strict_mode(config.strict);
            register_default_helpers(registry);
        }
        Self { raw, escaped }
    }

    fn registry(&self, format: OutputFormat) -> &Handlebars<'static> {
        match format {
            OutputFormat::Html => &self.escaped,
            OutputFormat::Text | OutputFormat::Markdown => &self.raw,
        }
    }
}

impl Default for HandlebarsTemplater {
    fn default() -> Self {
        Self::new(TemplaterConfig::default())
    }
}

impl std::fmt::Debug for HandlebarsTemplater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlebarsTemplater")
            .field("strict", &self.raw.strict_mode())
            .finish()
    }
}

/// Helpers available to every module template on top of the handlebars built-ins.
pub fn register_default_helpers(registry: &mut Handlebars<'_>) {
    registry.register_helper("join", Box::new(join));
}

impl Templater for HandlebarsTemplater {
    fn referenced_variables(&self, template: &str) -> Result<BTreeSet<String>, TemplateError> {
        let compiled = Template::compile(template)?;
        let mut names = BTreeSet::new();
        collect_template(&compiled, 0, &mut names);
        Ok(names)
    }

    fn render(
        &self,
        template: &str,
        answers: &Answers,
        format: OutputFormat,
    ) -> Result<String, TemplateError> {
        Ok(self.registry(format).render_template(template, answers)?)
    }
}

/// Helpers every templater registers; a bare `{{name}}` matching one is a call, not a variable.
const HELPERS: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "raw", "log", "eq", "ne", "gt", "gte", "lt", "lte",
    "and", "or", "not", "len", "join",
];

/// Block helpers whose body renders against a nested context.
const CONTEXT_HELPERS: &[&str] = &["each", "with"];

fn collect_template(template: &Template, depth: usize, names: &mut BTreeSet<String>) {
    for element in &template.elements {
        collect_element(element, depth, names);
    }
}

fn collect_element(element: &TemplateElement, depth: usize, names: &mut BTreeSet<String>) {
    match element {
        TemplateElement::Expression(helper) | TemplateElement::HtmlExpression(helper) => {
            let is_call = !helper.params.is_empty()
                || !helper.hash.is_empty()
                || helper
                    .name
                    .as_name()
                    .is_some_and(|name| HELPERS.contains(&name));
            if !is_call {
                collect_parameter(&helper.name, depth, names);
            }
            for parameter in helper.params.iter().chain(helper.hash.values()) {
                collect_parameter(parameter, depth, names);
            }
        }
        TemplateElement::HelperBlock(helper) => {
            for parameter in helper.params.iter().chain(helper.hash.values()) {
                collect_parameter(parameter, depth, names);
            }
            let nested = helper
                .name
                .as_name()
                .is_some_and(|name| CONTEXT_HELPERS.contains(&name));
            if let Some(body) = &helper.template {
                collect_template(body, if nested { depth + 1 } else { depth }, names);
            }
            if let Some(inverse) = &helper.inverse {
                collect_template(inverse, depth, names);
            }
        }
        TemplateElement::DecoratorExpression(decorator)
        | TemplateElement::DecoratorBlock(decorator)
        | TemplateElement::PartialExpression(decorator)
        | TemplateElement::PartialBlock(decorator) => {
            for parameter in decorator.params.iter().chain(decorator.hash.values()) {
                collect_parameter(parameter, depth, names);
            }
            if let Some(body) = &decorator.template {
                collect_template(body, depth, names);
            }
        }
        _ => {}
    }
}

fn collect_parameter(parameter: &Parameter, depth: usize, names: &mut BTreeSet<String>) {
    match parameter {
        Parameter::Path(path) => {
            if let Some(root) = answer_root(path, depth) {
                names.insert(root);
            }
        }
        Parameter::Subexpression(subexpression) => {
            collect_element(&subexpression.element, depth, names);
        }
        _ => {}
    }
}

/// First segment of `path` when it resolves against the answers map.
///
/// Inside `depth` nested contexts only `@root` paths or enough `../` hops
/// reach the answers; everything else names a field of the current item.
fn answer_root(path: &Path, depth: usize) -> Option<String> {
    let Path::Relative((segments, raw)) = path else {
        return None;
    };
    let mut rest = ["this.", "this/", "./"]
        .iter()
        .find_map(|prefix| raw.strip_prefix(*prefix))
        .unwrap_or(raw.as_str());
    let from_root = rest.starts_with("@root");
    let mut ups = 0;
    while let Some(after) = rest.strip_prefix("..") {
        ups += 1;
        rest = after.strip_prefix(['/', '.']).unwrap_or(after);
    }
    if !from_root && ups < depth {
        return None;
    }
    segments.iter().find_map(|segment| match segment {
        PathSeg::Named(name) => Some(name.clone()),
        _ => None,
    })
}
