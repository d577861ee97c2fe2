use serial_test::serial;
use sfdt::stores::{
    load_cookie_jar, EnvSessionStore, FileSessionStore, SessionStores, SESSION_HREF_ENV,
    SESSION_ID_ENV,
};
use sfdt_core::contract::{CredentialDirectory, StoredSession, StoredSessionStore};
use std::env;
use std::fs::write;
use tempfile::{tempdir, NamedTempFile};

fn clear_session_env() {
    env::remove_var(SESSION_ID_ENV);
    env::remove_var(SESSION_HREF_ENV);
}

#[tokio::test]
async fn cookie_export_loads_and_ignores_extra_fields() {
    let file = NamedTempFile::new().unwrap();
    write(
        file.path(),
        r#"[
  {"name": "sid", "domain": ".acme.my.salesforce.com", "value": "tok", "path": "/", "secure": true, "httpOnly": true},
  {"name": "oid", "domain": ".acme.my.salesforce.com", "value": "00D"},
  {"name": "sid", "domain": "acme.lightning.force.com", "value": "frontend"}
]"#,
    )
    .unwrap();

    let jar = load_cookie_jar(file.path()).expect("jar loads");
    assert_eq!(jar.len(), 3);
    assert_eq!(jar.list_tokens("sid").await.len(), 2);
    assert_eq!(
        jar.get_token("https://acme.my.salesforce.com/", "sid").await,
        Some("tok".to_string())
    );
}

#[test]
fn malformed_cookie_export_is_a_parse_error() {
    let file = NamedTempFile::new().unwrap();
    write(file.path(), "{\"not\": \"an array\"}").unwrap();
    let err = load_cookie_jar(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse cookie file"));
}

#[tokio::test]
async fn file_store_round_trips_and_tolerates_absence() {
    let dir = tempdir().unwrap();
    let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));
    assert_eq!(store.load().await, None);

    let session = StoredSession {
        session_id: "00D!abc".to_string(),
        href: "https://acme.lightning.force.com/lightning/page/home".to_string(),
    };
    store.save(&session).unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert!(raw.contains("\"sessionId\""));
    assert_eq!(store.load().await, Some(session));
}

#[tokio::test]
async fn corrupt_session_file_reads_as_absent() {
    let file = NamedTempFile::new().unwrap();
    write(file.path(), "not json").unwrap();
    let store = FileSessionStore::new(file.path());
    assert!(store.read().is_err());
    assert_eq!(store.load().await, None);
}

#[tokio::test]
#[serial]
async fn environment_session_needs_both_variables() {
    clear_session_env();
    env::set_var(SESSION_ID_ENV, "from-env");
    assert_eq!(EnvSessionStore.load().await, None);

    env::set_var(SESSION_HREF_ENV, "https://acme.lightning.force.com/");
    let stored = EnvSessionStore.load().await.expect("both set");
    clear_session_env();
    assert_eq!(stored.session_id, "from-env");
}

#[tokio::test]
#[serial]
async fn environment_wins_over_session_file() {
    clear_session_env();
    let dir = tempdir().unwrap();
    let file = FileSessionStore::new(dir.path().join("session.json"));
    file.save(&StoredSession {
        session_id: "from-file".to_string(),
        href: "https://acme.lightning.force.com/".to_string(),
    })
    .unwrap();
    let stores = SessionStores::new(Some(file));

    assert_eq!(stores.load().await.unwrap().session_id, "from-file");

    env::set_var(SESSION_ID_ENV, "from-env");
    env::set_var(SESSION_HREF_ENV, "https://acme.lightning.force.com/");
    let loaded = stores.load().await;
    clear_session_env();
    assert_eq!(loaded.unwrap().session_id, "from-env");
}
