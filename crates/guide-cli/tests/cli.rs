use assert_cmd::Command;
use assert_fs::TempDir;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

const LINEAR: &str = include_str!("../../guide-spec/tests/fixtures/linear_chain.json");
const SKIP_BRANCH: &str = include_str!("../../guide-spec/tests/fixtures/skip_branch.json");

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

fn guided(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("guided").expect("binary");
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("utf8")
}

#[test]
fn wizard_runs_to_completion() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = TempDir::new()?;
    let module = write(workspace.path(), "linear_chain.json", LINEAR);
    let save = workspace.path().join("answers.json");

    let out = stdout(
        guided(&workspace)
            .arg("wizard")
            .arg("--module")
            .arg(&module)
            .arg("--save")
            .arg(&save)
            .write_stdin("Payroll\nFinance\n2\n"),
    );

    assert!(out.contains("Module: Linear chain"));
    assert!(out.contains("Who owns Payroll?"));
    assert!(out.contains("Payroll is owned by Finance and hosted on-prem."));

    let saved: Value = serde_json::from_str(&fs::read_to_string(&save)?)?;
    assert_eq!(
        saved,
        json!({ "q1": "Payroll", "q2": "Finance", "q3": "on-prem" })
    );
    Ok(())
}

#[test]
fn wizard_fails_when_stdin_closes_early() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = TempDir::new()?;
    let module = write(workspace.path(), "linear_chain.json", LINEAR);

    guided(&workspace)
        .arg("wizard")
        .arg("--module")
        .arg(&module)
        .write_stdin("Payroll\n")
        .assert()
        .failure();
    Ok(())
}

#[test]
fn next_reports_the_pending_question() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = TempDir::new()?;
    let module = write(workspace.path(), "skip_branch.json", SKIP_BRANCH);
    let yes = write(workspace.path(), "yes.json", r#"{"q1": "yes"}"#);
    let no = write(workspace.path(), "no.json", r#"{"q1": "no"}"#);

    let first = stdout(guided(&workspace).arg("next").arg("--module").arg(&module));
    assert_eq!(first.trim(), "q1");

    let branch = stdout(
        guided(&workspace)
            .args(["next", "--module"])
            .arg(&module)
            .arg("--answers")
            .arg(&yes),
    );
    assert_eq!(branch.trim(), "q2");

    let done = stdout(
        guided(&workspace)
            .args(["next", "--module"])
            .arg(&module)
            .arg("--answers")
            .arg(&no),
    );
    assert_eq!(done.trim(), "complete");
    Ok(())
}

#[test]
fn render_writes_document_and_drops_skipped_answers() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = TempDir::new()?;
    let module = write(workspace.path(), "skip_branch.json", SKIP_BRANCH);
    let answers = write(
        workspace.path(),
        "answers.json",
        r#"{"q1": "no", "q2": "health records"}"#,
    );
    let out = workspace.path().join("plan.txt");

    guided(&workspace)
        .args(["render", "--module"])
        .arg(&module)
        .arg("--answers")
        .arg(&answers)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&out)?, "personal data: no");
    Ok(())
}

#[test]
fn render_refuses_incomplete_answers() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = TempDir::new()?;
    let module = write(workspace.path(), "linear_chain.json", LINEAR);
    let answers = write(workspace.path(), "answers.json", r#"{"q1": "Payroll"}"#);

    let output = guided(&workspace)
        .args(["render", "--module"])
        .arg(&module)
        .arg("--answers")
        .arg(&answers)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8(output)?.contains("next question is 'q2'"));
    Ok(())
}

#[test]
fn check_reports_questions_that_are_never_asked() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = TempDir::new()?;
    let module = write(
        workspace.path(),
        "notes.json",
        &json!({
            "id": "notes",
            "title": "Notes",
            "questions": [
                { "id": "owner", "title": "Owner", "type": "text" },
                { "id": "notes", "title": "Notes", "type": "longtext", "depends_on": [] }
            ],
            "output": { "template": "Owner: {{owner}}" }
        })
        .to_string(),
    );

    let out = stdout(guided(&workspace).args(["check", "--module"]).arg(&module));
    assert!(out.contains("Referenced by output: owner"));
    assert!(out.contains("Never asked: notes"));
    Ok(())
}

#[test]
fn check_rejects_unknown_dependencies() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = TempDir::new()?;
    let module = write(
        workspace.path(),
        "unknown.json",
        include_str!("../../guide-spec/tests/fixtures/unknown_dependency.json"),
    );

    let output = guided(&workspace)
        .args(["check", "--module"])
        .arg(&module)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8(output)?.contains("q9"));
    Ok(())
}

#[test]
fn config_file_enables_forward_references() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = TempDir::new()?;
    let module = write(
        workspace.path(),
        "forward.json",
        &json!({
            "id": "forward",
            "title": "Forward",
            "questions": [
                { "id": "q1", "title": "Q1", "type": "text", "depends_on": ["q2"] },
                { "id": "q2", "title": "Q2", "type": "text", "depends_on": [] }
            ],
            "output": { "template": "{{q1}}" }
        })
        .to_string(),
    );

    guided(&workspace)
        .args(["next", "--module"])
        .arg(&module)
        .assert()
        .failure();

    write(
        workspace.path(),
        "guided.toml",
        "[build]\nallow_forward_references = true\n",
    );
    let out = stdout(guided(&workspace).args(["next", "--module"]).arg(&module));
    assert_eq!(out.trim(), "q2");
    Ok(())
}

#[test]
fn list_shows_answerable_modules_only() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = TempDir::new()?;
    let modules = workspace.path().join("modules");
    fs::create_dir(&modules)?;
    write(&modules, "linear_chain.json", LINEAR);
    write(
        &modules,
        "offline.json",
        &json!({
            "id": "offline",
            "title": "Offline",
            "answerable_in_context": false,
            "questions": [],
            "output": { "template": "n/a" }
        })
        .to_string(),
    );

    let out = stdout(guided(&workspace).arg("list").arg("--dir").arg(&modules));
    assert!(out.contains("linear_chain\tLinear chain\t3 questions"));
    assert!(!out.contains("offline"));
    Ok(())
}

#[test]
fn schema_describes_module_answers() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = TempDir::new()?;
    let module = write(workspace.path(), "linear_chain.json", LINEAR);

    let out = stdout(guided(&workspace).args(["schema", "--module"]).arg(&module));
    let schema: Value = serde_json::from_str(&out)?;
    assert_eq!(schema["additionalProperties"], json!(false));
    assert_eq!(schema["properties"]["q3"]["enum"], json!(["cloud", "on-prem"]));

    let out = stdout(guided(&workspace).args(["schema", "--definition"]));
    let schema: Value = serde_json::from_str(&out)?;
    assert!(schema.get("properties").is_some());
    Ok(())
}
