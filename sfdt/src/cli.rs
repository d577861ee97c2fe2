//! # sfdt CLI interface
//!
//! Command parsing, config loading and adapter wiring for the `sfdt` binary. Session resolution,
//! the SOAP codec, packaging and deploy polling all live in [`sfdt_core`]; this module only
//! builds the adapters (cookie jar, stored-session stores, HTTP transport) and prints replies.
//!
//! Every command prints one JSON reply on stdout. Failures print `{"error": "..."}` (the deploy
//! command prints `{"success": false, "error": "..."}`) and make [`run`] return an error, so the
//! process exits non-zero.
use crate::load_config::{load_optional_config, CliConfig};
use crate::stores::{load_cookie_jar, FileSessionStore, SessionStores};
use crate::transport::HttpTransport;
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sfdt_core::client::{FieldTranslations, OrgClient, PicklistValueTranslation};
use sfdt_core::connection::{Connection, ConnectionReply, DataReply};
use sfdt_core::contract::{HttpMethod, StoredSession, TokioSleeper, Transport};
use sfdt_core::credentials::CookieJar;
use sfdt_core::deploy::DeployOrchestrator;
use sfdt_core::session::SessionResolver;
use sfdt_core::translation::{PicklistTranslation, TranslationPayload};
use sfdt_core::BridgeError;
use std::path::PathBuf;

/// CLI for sfdt: reuse an existing Salesforce browser session for metadata and REST work.
#[derive(Parser)]
#[clap(
    name = "sfdt",
    version,
    about = "Resolve the Salesforce session behind a page URL and use it for describe, REST and translation deploys"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the session for a page and print the connection
    Connect {
        /// URL of the Salesforce page being viewed
        #[clap(long)]
        url: String,
    },
    /// Print field labels and active picklist values of an object in one locale
    Describe {
        #[clap(long)]
        url: String,
        #[clap(long)]
        object: String,
        #[clap(long)]
        locale: String,
    },
    /// Print a field's English/Spanish labels and its picklist values in French, English and Spanish
    Translations {
        #[clap(long)]
        url: String,
        #[clap(long)]
        object: String,
        #[clap(long)]
        field: String,
    },
    /// Package and deploy a field translation, then wait for it to finish
    Deploy {
        #[clap(long)]
        url: String,
        #[clap(long)]
        object: String,
        #[clap(long)]
        field: String,
        #[clap(long)]
        locale: String,
        /// Translated field label
        #[clap(long)]
        label: Option<String>,
        /// Picklist translation as MASTER=TRANSLATION; repeatable
        #[clap(long = "picklist", value_parser = parse_picklist)]
        picklist: Vec<PicklistTranslation>,
    },
    /// Issue a REST call against the org with the resolved session
    Api {
        #[clap(long)]
        url: String,
        /// Path below the instance URL, e.g. /services/data/v62.0/limits
        #[clap(long)]
        path: String,
        #[clap(long, default_value = "GET")]
        method: String,
        /// JSON request body
        #[clap(long)]
        body: Option<String>,
    },
    /// Run a SOQL query through the REST or Tooling API
    Query {
        #[clap(long)]
        url: String,
        #[clap(long)]
        soql: String,
        /// Query the Tooling API instead of the data API
        #[clap(long)]
        tooling: bool,
        /// Follow nextRecordsUrl until the result is complete
        #[clap(long)]
        all: bool,
    },
    /// Find Apex classes or flows by name
    Search {
        #[clap(long)]
        url: String,
        #[clap(long, value_enum)]
        kind: SearchKind,
        #[clap(long)]
        term: String,
    },
    /// Record a session as the last-resort fallback for later resolution
    Remember {
        #[clap(long)]
        session_id: String,
        /// URL of the page the session was seen on
        #[clap(long)]
        href: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchKind {
    Apex,
    Flow,
}

fn parse_picklist(raw: &str) -> Result<PicklistTranslation, String> {
    match raw.split_once('=') {
        Some((master, translation)) if !master.is_empty() => Ok(PicklistTranslation {
            master_label: master.to_string(),
            translation: translation.to_string(),
        }),
        _ => Err(format!("expected MASTER=TRANSLATION, got {raw:?}")),
    }
}

/// What a command prints, and the failure to report once it is printed.
struct Reply {
    body: serde_json::Value,
    failure: Option<String>,
}

impl Reply {
    fn new(body: impl Serialize, failure: Option<String>) -> Result<Self> {
        Ok(Self {
            body: serde_json::to_value(body)?,
            failure,
        })
    }

    fn data<T: Serialize>(result: Result<T, BridgeError>) -> Result<Self> {
        let failure = result.as_ref().err().map(ToString::to_string);
        Self::new(DataReply::from(result), failure)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslationsView {
    field: FieldTranslations,
    picklist_values: Vec<PicklistValueTranslation>,
}

/// Adapters shared by every command that talks to an org.
struct Wiring {
    config: CliConfig,
    resolver: SessionResolver<CookieJar, SessionStores>,
    transport: HttpTransport,
}

impl Wiring {
    fn new(config: CliConfig) -> Result<Self> {
        let jar = match &config.cookie_file {
            Some(path) => load_cookie_jar(path)?,
            None => {
                tracing::warn!("No cookie file configured; only the stored session can resolve");
                CookieJar::default()
            }
        };
        let stores = SessionStores::new(
            config
                .stored_session_file
                .as_ref()
                .map(FileSessionStore::new),
        );
        let transport = HttpTransport::new(config.http_timeout())?;
        Ok(Self {
            resolver: SessionResolver::new(jar, stores),
            transport,
            config,
        })
    }

    async fn connect(&self, url: &str) -> Result<Connection, BridgeError> {
        self.resolver.connect(url, &self.config.api_version).await
    }
}

async fn dispatch(command: Commands, config: CliConfig) -> Result<Reply> {
    match command {
        Commands::Connect { url } => {
            let wiring = Wiring::new(config)?;
            let result = wiring.connect(&url).await;
            if let Ok(connection) = &result {
                tracing::info!(command = "connect", org = %connection.org_name(), "Connected");
            }
            let failure = result.as_ref().err().map(ToString::to_string);
            Reply::new(ConnectionReply::from(result), failure)
        }
        Commands::Describe {
            url,
            object,
            locale,
        } => {
            let wiring = Wiring::new(config)?;
            let result = async {
                let connection = wiring.connect(&url).await?;
                OrgClient::new(&connection, &wiring.transport)
                    .describe_for_locale(&object, &locale)
                    .await
            }
            .await;
            Reply::data(result)
        }
        Commands::Translations { url, object, field } => {
            let wiring = Wiring::new(config)?;
            let result = async {
                let connection = wiring.connect(&url).await?;
                let client = OrgClient::new(&connection, &wiring.transport);
                let (field_labels, picklist_values) = tokio::try_join!(
                    client.field_translations(&object, &field),
                    client.picklist_translations(&object, &field),
                )?;
                Ok::<_, BridgeError>(TranslationsView {
                    field: field_labels,
                    picklist_values,
                })
            }
            .await;
            Reply::data(result)
        }
        Commands::Deploy {
            url,
            object,
            field,
            locale,
            label,
            picklist,
        } => {
            if label.is_none() && picklist.is_empty() {
                anyhow::bail!("Nothing to deploy: pass --label and/or --picklist");
            }
            let mut payload =
                TranslationPayload::new(object, field, locale).with_picklist_values(picklist);
            if let Some(label) = label {
                payload = payload.with_label(label);
            }

            let wiring = Wiring::new(config)?;
            let connection = match wiring.connect(&url).await {
                Ok(connection) => connection,
                Err(e) => return Reply::data::<()>(Err(e)),
            };
            let sleeper = TokioSleeper;
            let report = DeployOrchestrator::new(
                OrgClient::new(&connection, &wiring.transport),
                &sleeper,
            )
            .with_policy(wiring.config.poll_policy())
            .run(&payload)
            .await;
            tracing::info!(command = "deploy", job_id = ?report.job_id, polls = report.polls, state = ?report.state, "Deploy finished");

            let outcome = report.outcome();
            let failure = outcome.error.clone().filter(|_| !outcome.success);
            Reply::new(outcome, failure)
        }
        Commands::Api {
            url,
            path,
            method,
            body,
        } => {
            let method: HttpMethod = method.parse().map_err(anyhow::Error::msg)?;
            let wiring = Wiring::new(config)?;
            let result = async {
                let connection = wiring.connect(&url).await?;
                OrgClient::new(&connection, &wiring.transport)
                    .rest_request(&path, method, body)
                    .await
            }
            .await;
            Reply::data(result)
        }
        Commands::Query {
            url,
            soql,
            tooling,
            all,
        } => {
            let wiring = Wiring::new(config)?;
            let result = async {
                let connection = wiring.connect(&url).await?;
                let client = OrgClient::new(&connection, &wiring.transport);
                let first = if tooling {
                    client.tooling_query(&soql).await?
                } else {
                    client.query(&soql).await?
                };
                if all {
                    collect_pages(&client, first).await
                } else {
                    Ok(first)
                }
            }
            .await;
            Reply::data(result)
        }
        Commands::Search { url, kind, term } => {
            let wiring = Wiring::new(config)?;
            let result = async {
                let connection = wiring.connect(&url).await?;
                let client = OrgClient::new(&connection, &wiring.transport);
                let rows = match kind {
                    SearchKind::Apex => serde_json::to_value(client.search_apex_classes(&term).await?),
                    SearchKind::Flow => serde_json::to_value(client.search_flows(&term).await?),
                };
                rows.map_err(|e| BridgeError::InvalidResponse(e.to_string()))
            }
            .await;
            Reply::data(result)
        }
        Commands::Remember { session_id, href } => {
            let path = config.stored_session_file.clone().ok_or_else(|| {
                anyhow::anyhow!("No stored_session_file configured; set it in the config file")
            })?;
            let store = FileSessionStore::new(path);
            store.save(&StoredSession { session_id, href })?;
            Reply::new(
                serde_json::json!({ "stored": store.path().display().to_string() }),
                None,
            )
        }
    }
}

/// Appends the records of every following page to the first page's `records`.
async fn collect_pages<T: Transport>(
    client: &OrgClient<'_, T>,
    mut result: serde_json::Value,
) -> Result<serde_json::Value, BridgeError> {
    let mut next = next_records_url(&result);
    while let Some(next_url) = next {
        let page = client.query_more(&next_url).await?;
        tracing::debug!(next = %next_url, "Fetched next query page");
        if let (Some(all), Some(more)) = (
            result.get_mut("records").and_then(|r| r.as_array_mut()),
            page.get("records").and_then(|r| r.as_array()),
        ) {
            all.extend(more.iter().cloned());
        }
        next = next_records_url(&page);
    }
    if let Some(object) = result.as_object_mut() {
        object.insert("done".to_string(), serde_json::Value::Bool(true));
        object.remove("nextRecordsUrl");
    }
    Ok(result)
}

fn next_records_url(page: &serde_json::Value) -> Option<String> {
    let done = page.get("done").and_then(|d| d.as_bool()).unwrap_or(true);
    if done {
        return None;
    }
    page.get("nextRecordsUrl")
        .and_then(|u| u.as_str())
        .map(str::to_string)
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let outcome = match load_optional_config(cli.config.as_deref()) {
        Ok(config) => dispatch(cli.command, config).await,
        Err(e) => Err(e),
    };

    let reply = match outcome {
        Ok(reply) => reply,
        Err(e) => Reply {
            body: serde_json::json!({ "error": e.to_string() }),
            failure: Some(e.to_string()),
        },
    };
    println!("{}", serde_json::to_string_pretty(&reply.body)?);

    match reply.failure {
        Some(message) => {
            tracing::error!(error = %message, "Command failed");
            Err(anyhow::Error::msg(message))
        }
        None => Ok(()),
    }
}
