use std::error::Error;
use std::io::Write;

use tempfile::NamedTempFile;

use passdag::cli::CliArgs;
use passdag::config::PassKind;
use passdag::pass::SubmittedPass;
use passdag::sim::Scenario;
use passdag::types::{DocumentId, PassId};
use passdag_test_utils::builders::{ConfigFileBuilder, EditorConfigBuilder, PassConfigBuilder};

type TestResult = Result<(), Box<dyn Error>>;

const SMALL_CONFIG: &str = r#"
[scheduler]
worker_threads = 2

[[editor]]
name = "main.rs"
document = 1
selected = true

[[editor.pass]]
id = 1
name = "general"
collect_ms = 5

[[editor.pass]]
id = 2
name = "lines"
starting_after = [1]

[[editor.pass]]
id = 3
name = "annotator"
after = [1]
run_intentions_after = true

[[editor]]
name = "split.rs"
document = 1

[[editor.pass]]
id = 4
kind = "legacy"
name = "old"
"#;

fn write_config(contents: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{contents}")?;
    Ok(file)
}

fn args(file: &NamedTempFile) -> CliArgs {
    CliArgs {
        config: Some(file.path().to_string_lossy().into_owned()),
        dry_run: false,
        cancel_after_ms: None,
        log_level: None,
    }
}

#[test]
fn dry_run_does_not_execute() -> TestResult {
    let file = write_config(SMALL_CONFIG)?;
    let mut args = args(&file);
    args.dry_run = true;

    passdag::run(args)?;
    Ok(())
}

#[test]
fn full_run_completes() -> TestResult {
    let file = write_config(SMALL_CONFIG)?;
    passdag::run(args(&file))?;
    Ok(())
}

#[test]
fn failing_pass_fails_the_run() -> TestResult {
    let file = write_config(
        r#"
[[editor]]
name = "main.rs"
document = 1

[[editor.pass]]
id = 1
name = "broken"
fail = true
"#,
    )?;

    let err = passdag::run(args(&file)).expect_err("run should fail");
    let msg = format!("{err:#}");
    assert!(msg.contains("round failed"), "unexpected error: {msg}");
    assert!(msg.contains("simulated collect failure in 'broken'"), "unexpected error: {msg}");
    Ok(())
}

#[test]
fn canceled_run_is_not_an_error() -> TestResult {
    let file = write_config(
        r#"
[[editor]]
name = "main.rs"
document = 1

[[editor.pass]]
id = 1
name = "slow"
collect_ms = 2000
"#,
    )?;
    let mut args = args(&file);
    args.cancel_after_ms = Some(20);

    passdag::run(args)?;
    Ok(())
}

#[test]
fn invalid_config_is_reported_before_running() -> TestResult {
    let file = write_config("[scheduler]\nworker_threads = 1\n")?;
    let err = passdag::run(args(&file)).expect_err("config should be rejected");
    assert!(format!("{err}").contains("at least one [[editor]]"));
    Ok(())
}

#[test]
fn scenario_mirrors_config() {
    let cfg = ConfigFileBuilder::new()
        .dumb(true)
        .with_editor(
            EditorConfigBuilder::new("main.rs")
                .document(7)
                .selected(true)
                .pass(PassConfigBuilder::new(1, "general").dumb_aware(true).build())
                .pass(PassConfigBuilder::new(2, "overlay").kind(PassKind::Editor).build())
                .build(),
        )
        .with_editor(
            EditorConfigBuilder::new("notes.txt")
                .valid(false)
                .pass(PassConfigBuilder::new(1, "spell").build())
                .build(),
        )
        .build();

    let scenario = Scenario::from_config(&cfg);
    assert_eq!(scenario.editors().count(), 2);

    let main = scenario.editor("main.rs").expect("main editor");
    assert_eq!(main.document(), Some(DocumentId(7)));
    assert!(main.is_valid());
    assert_eq!(scenario.editor_name(main.id()), Some("main.rs"));

    let notes = scenario.editor("notes.txt").expect("notes editor");
    assert!(!notes.is_valid());
    assert_eq!(notes.document(), None);

    let batch = scenario.batch();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].1.len(), 2);
    match &batch[0].1[0] {
        SubmittedPass::DocumentBound(pass) => {
            assert_eq!(pass.id(), PassId(1));
            assert_eq!(pass.name(), "general");
        }
        other => panic!("expected a document-bound pass, got {other:?}"),
    }
    assert!(matches!(batch[0].1[1], SubmittedPass::EditorBound(_)));

    // Batches are rebuilt on every call.
    assert_eq!(scenario.batch()[1].1.len(), 1);
}
