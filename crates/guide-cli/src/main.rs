mod config;
mod wizard;

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use guide_session::{next as session_next, render as session_render, submit_patch};
use guide_spec::{
    DirectoryProvider, EngineConfig, HandlebarsTemplater, Module, ModuleDefinition, Resolver,
    Templater, answerable_modules, answers_from_value, answers_schema, definition_schema,
    validate,
};
use serde_json::{Map, Value, json};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use wizard::{PromptContext, Verbosity, WizardPresenter, prompt_question};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Guided-module question wizard",
    long_about = "Asks the questions a guided module needs, in dependency order, and renders its output document"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Engine configuration file (defaults to ./guided.toml when present).
    #[arg(long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a module interactively and print its rendered output.
    Wizard {
        /// Path to the module definition JSON.
        #[arg(long, value_name = "MODULE")]
        module: PathBuf,
        /// Optional JSON file containing answers from an earlier session.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Write the collected answers here on completion.
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
        /// Also print the answers JSON on completion.
        #[arg(long)]
        answers_json: bool,
    },
    /// Print the id of the next question, or `complete`.
    Next {
        #[arg(long, value_name = "MODULE")]
        module: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Render the output document of a completed module.
    Render {
        #[arg(long, value_name = "MODULE")]
        module: PathBuf,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        /// Write the document to a file instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Build a module definition and syntax-check its templates.
    Check {
        #[arg(long, value_name = "MODULE")]
        module: PathBuf,
        /// Also validate an answers file against the module.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// List the answerable modules in a directory of definitions.
    List {
        #[arg(long, value_name = "DIR")]
        dir: PathBuf,
    },
    /// Print the answers JSON schema of a module, or the definition schema.
    Schema {
        #[arg(long, value_name = "MODULE", required_unless_present = "definition")]
        module: Option<PathBuf>,
        #[arg(long, conflicts_with = "module")]
        definition: bool,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let engine = config::load(cli.config.as_deref())?;
    debug!(?engine, "loaded engine configuration");

    match cli.command {
        Command::Wizard {
            module,
            answers,
            save,
            answers_json,
        } => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            run_wizard(
                &engine,
                &module,
                answers.as_deref(),
                save.as_deref(),
                WizardPresenter::new(Verbosity::from_verbose(cli.verbose > 0), answers_json),
                &mut input,
            )
        }
        Command::Next { module, answers } => run_next(&engine, &module, answers.as_deref()),
        Command::Render {
            module,
            answers,
            out,
        } => run_render(&engine, &module, &answers, out.as_deref()),
        Command::Check { module, answers } => run_check(&engine, &module, answers.as_deref()),
        Command::List { dir } => run_list(&engine, &dir),
        Command::Schema { module, definition } => run_schema(&engine, module.as_deref(), definition),
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn read_definition(path: &Path) -> CliResult<ModuleDefinition> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
    Ok(serde_json::from_str(&contents)?)
}

fn read_answers(path: Option<&Path>) -> CliResult<Value> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
            let value: Value = serde_json::from_str(&contents)?;
            if !value.is_object() {
                return Err(format!("{} must contain a JSON object", path.display()).into());
            }
            Ok(value)
        }
        None => Ok(Value::Object(Map::new())),
    }
}

/// Session config document carrying the definition and engine settings.
fn session_config(definition: &ModuleDefinition, engine: &EngineConfig) -> String {
    json!({ "module": definition, "engine": engine }).to_string()
}

fn parse_session_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn run_wizard(
    engine: &EngineConfig,
    module_path: &Path,
    answers_path: Option<&Path>,
    save_path: Option<&Path>,
    mut presenter: WizardPresenter,
    input: &mut dyn BufRead,
) -> CliResult<()> {
    let definition = read_definition(module_path)?;
    let module_id = definition.id.clone();
    let config_json = session_config(&definition, engine);
    let mut answers = read_answers(answers_path)?;
    info!(module = %module_id, "starting wizard");

    presenter.show_header(&definition.title, definition.description.as_deref());

    loop {
        let answers_str = answers.to_string();
        let state = parse_session_result(&session_next(&module_id, &config_json, &answers_str))?;
        if state["status"] == "complete" {
            let rendered =
                parse_session_result(&session_render(&module_id, &config_json, &answers_str))?;
            let document = rendered["document"]
                .as_str()
                .ok_or("render returned no document")?;
            if let Some(path) = save_path {
                fs::write(path, serde_json::to_string_pretty(&answers)?)?;
            }
            presenter.show_completion(document, &answers);
            return Ok(());
        }

        let prompt = PromptContext::from_payload(&state)?;
        let answer = prompt_question(&prompt, &presenter, input)?;
        let submitted = parse_session_result(&submit_patch(
            &module_id,
            &config_json,
            &answers_str,
            &prompt.id,
            &serde_json::to_string(&answer)?,
        ))?;

        if submitted["status"] == "error" {
            presenter.show_validation(&submitted["validation"]);
            continue;
        }
        answers = submitted["answers"].clone();
    }
}

fn run_next(engine: &EngineConfig, module_path: &Path, answers_path: Option<&Path>) -> CliResult<()> {
    let definition = read_definition(module_path)?;
    let answers = read_answers(answers_path)?;
    let state = parse_session_result(&session_next(
        &definition.id,
        &session_config(&definition, engine),
        &answers.to_string(),
    ))?;
    match state["next_question"]["id"].as_str() {
        Some(id) => println!("{}", id),
        None => println!("complete"),
    }
    Ok(())
}

fn run_render(
    engine: &EngineConfig,
    module_path: &Path,
    answers_path: &Path,
    out: Option<&Path>,
) -> CliResult<()> {
    let definition = read_definition(module_path)?;
    let answers = read_answers(Some(answers_path))?;
    let rendered = parse_session_result(&session_render(
        &definition.id,
        &session_config(&definition, engine),
        &answers.to_string(),
    ))?;
    if rendered["status"] != "complete" {
        let next = rendered["next_question_id"].as_str().unwrap_or("<unknown>");
        return Err(format!("module is incomplete; next question is '{}'", next).into());
    }
    let document = rendered["document"]
        .as_str()
        .ok_or("render returned no document")?;
    match out {
        Some(path) => fs::write(path, document)?,
        None => println!("{}", document),
    }
    Ok(())
}

fn run_check(
    engine: &EngineConfig,
    module_path: &Path,
    answers_path: Option<&Path>,
) -> CliResult<()> {
    let definition = read_definition(module_path)?;
    let module = Module::build_with(definition, &engine.build)?;
    let resolver = Resolver::from_config(engine);
    let templater = HandlebarsTemplater::new(engine.templates);

    for question in module.questions() {
        templater
            .referenced_variables(question.prompt_template())
            .map_err(|err| format!("prompt of question '{}': {}", question.id(), err))?;
    }

    let referenced: Vec<&str> = resolver
        .referenced_questions(&module)?
        .into_iter()
        .map(|question| question.id())
        .collect();
    let reachable = reachable_questions(&module, &referenced);
    let never_asked: Vec<&str> = module
        .questions()
        .iter()
        .map(|question| question.id())
        .filter(|id| !reachable.contains(id))
        .collect();

    println!("Module: {} ({})", module.title(), module.id());
    println!("Questions: {}", module.questions().len());
    println!("Output format: {}", module.output().format.as_str());
    println!("Referenced by output: {}", display_ids(&referenced));
    println!("Never asked: {}", display_ids(&never_asked));

    if let Some(path) = answers_path {
        let answers = answers_from_value(&read_answers(Some(path))?);
        let result = validate(&module, &answers);
        for error in &result.errors {
            println!(
                "  - {}: {}",
                error.question_id.as_deref().unwrap_or("<unknown>"),
                error.message
            );
        }
        for field in &result.unknown_fields {
            println!("  - unknown answer '{}'", field);
        }
        println!(
            "Answers: {}",
            if result.valid { "valid" } else { "invalid" }
        );
        if !result.valid {
            return Err("answers failed validation".into());
        }
    }
    Ok(())
}

fn reachable_questions<'m>(module: &'m Module, roots: &[&str]) -> BTreeSet<&'m str> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<_> = roots
        .iter()
        .filter_map(|id| module.question(id))
        .collect();
    while let Some(question) = stack.pop() {
        if seen.insert(question.id()) {
            stack.extend(module.prerequisites(question));
        }
    }
    seen
}

fn display_ids(ids: &[&str]) -> String {
    if ids.is_empty() {
        "-".to_string()
    } else {
        ids.join(", ")
    }
}

fn run_list(engine: &EngineConfig, dir: &Path) -> CliResult<()> {
    let provider = DirectoryProvider::new(dir);
    let modules = answerable_modules(&provider, &engine.build)?;
    if modules.is_empty() {
        println!("No answerable modules in {}", dir.display());
    }
    for module in modules {
        println!(
            "{}\t{}\t{} questions",
            module.id(),
            module.title(),
            module.questions().len()
        );
    }
    Ok(())
}

fn run_schema(engine: &EngineConfig, module_path: Option<&Path>, definition: bool) -> CliResult<()> {
    let schema = if definition {
        definition_schema()?
    } else {
        let path = module_path.ok_or("--module or --definition is required")?;
        let module = Module::build_with(read_definition(path)?, &engine.build)?;
        answers_schema(&module)
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
