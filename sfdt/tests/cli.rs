use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::{tempdir, NamedTempFile};

fn cookie_file(contents: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Creating temp cookie file failed");
    write(file.path(), contents).expect("Writing temp cookie file failed");
    file
}

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Creating temp config file failed");
    write(file.path(), yaml).expect("Writing temp config failed");
    file
}

fn sfdt() -> Command {
    let mut cmd = Command::cargo_bin("sfdt").expect("Binary exists");
    cmd.env_remove("SFDT_COOKIE_FILE")
        .env_remove("SFDT_API_VERSION")
        .env_remove("SFDT_SESSION_ID")
        .env_remove("SFDT_SESSION_HREF");
    cmd
}

#[test]
fn connect_prints_resolved_connection() {
    let cookies = cookie_file(
        r#"[{"name": "sid", "domain": ".acme--uat.sandbox.my.salesforce.com", "value": "00D!secret"}]"#,
    );

    sfdt()
        .arg("connect")
        .arg("--url")
        .arg("https://acme--uat.sandbox.lightning.force.com/lightning/page/home")
        .env("SFDT_COOKIE_FILE", cookies.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""instanceUrl": "https://acme--uat.sandbox.my.salesforce.com""#)
                .and(predicate::str::contains(r#""sessionId": "00D!secret""#))
                .and(predicate::str::contains(r#""apiVersion": "62.0""#)),
        );
}

#[test]
fn connect_off_platform_prints_error_and_fails() {
    sfdt()
        .args(["connect", "--url", "https://example.com/home"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""error": "Not a Salesforce page""#));
}

#[test]
fn connect_without_any_session_reports_no_session() {
    let cookies = cookie_file("[]");
    sfdt()
        .args(["connect", "--url", "https://acme.lightning.force.com/"])
        .env("SFDT_COOKIE_FILE", cookies.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("No session found"));
}

#[test]
fn remembered_session_is_used_as_fallback() {
    let dir = tempdir().unwrap();
    let session_file = dir.path().join("session.json");
    let config = config_file(&format!(
        "stored_session_file: {}\napi_version: \"61.0\"\n",
        session_file.display()
    ));

    sfdt()
        .arg("--config")
        .arg(config.path())
        .args([
            "remember",
            "--session-id",
            "00D!remembered",
            "--href",
            "https://acme.lightning.force.com/lightning/o/Account/list",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("stored"));

    sfdt()
        .arg("--config")
        .arg(config.path())
        .args(["connect", "--url", "https://acme.lightning.force.com/one/one.app"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""instanceUrl": "https://acme.my.salesforce.com""#)
                .and(predicate::str::contains(r#""sessionId": "00D!remembered""#))
                .and(predicate::str::contains(r#""apiVersion": "61.0""#)),
        );
}

#[test]
fn deploy_without_label_or_picklist_is_rejected() {
    sfdt()
        .args([
            "deploy",
            "--url",
            "https://acme.lightning.force.com/",
            "--object",
            "Account",
            "--field",
            "Rating",
            "--locale",
            "es",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Nothing to deploy"));
}

#[test]
fn malformed_picklist_argument_is_a_usage_error() {
    sfdt()
        .args([
            "deploy",
            "--url",
            "https://acme.lightning.force.com/",
            "--object",
            "Account",
            "--field",
            "Rating",
            "--locale",
            "es",
            "--picklist",
            "no-separator",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("MASTER=TRANSLATION"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let msg = format!("{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use sfdt::cli::{run, Cli, Commands};

    let cli = Cli {
        config: Some(std::path::PathBuf::from("dummy.yaml")),
        command: Commands::Connect {
            url: "https://acme.lightning.force.com/".to_string(),
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}

#[test]
fn query_and_search_arguments_parse() {
    use clap::Parser;
    use sfdt::cli::{Cli, Commands, SearchKind};

    let cli = Cli::try_parse_from([
        "sfdt",
        "query",
        "--url",
        "https://acme.lightning.force.com/",
        "--soql",
        "SELECT Id FROM ApexClass",
        "--tooling",
        "--all",
    ])
    .expect("query parses");
    match cli.command {
        Commands::Query { tooling, all, soql, .. } => {
            assert!(tooling && all);
            assert_eq!(soql, "SELECT Id FROM ApexClass");
        }
        _ => panic!("expected query command"),
    }

    let cli = Cli::try_parse_from([
        "sfdt",
        "search",
        "--url",
        "https://acme.lightning.force.com/",
        "--kind",
        "flow",
        "--term",
        "Lead",
    ])
    .expect("search parses");
    assert!(matches!(
        cli.command,
        Commands::Search { kind: SearchKind::Flow, .. }
    ));

    assert!(Cli::try_parse_from([
        "sfdt", "search", "--url", "u", "--kind", "trigger", "--term", "x",
    ])
    .is_err());
}
