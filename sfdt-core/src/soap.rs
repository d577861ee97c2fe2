//! SOAP envelope codec for the three operations the engine needs: `describeSObject` (partner
//! API), `deploy` and `checkDeployStatus` (metadata API).
//!
//! Replies are read with a handful of named element rules instead of a full XML parser. The
//! consumed schema surface is small and stable; what matters is first-match-per-element, the
//! active-only filter on picklist values and the error-message fallback order of
//! [`parse_deploy_status`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::contract::{HttpMethod, HttpRequest, HttpResponse};
use crate::error::BridgeError;

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const PARTNER_NS: &str = "urn:partner.soap.sforce.com";
pub const METADATA_NS: &str = "http://soap.sforce.com/2006/04/metadata";

fn element(tag: &str) -> Regex {
    Regex::new(&format!(
        r"(?s)<(?:\w+:)?{tag}(?:\s(?:[^>]*[^/>])?)?>(.*?)</(?:\w+:)?{tag}>"
    ))
    .expect("element pattern is a valid regex")
}

static FIELDS: LazyLock<Regex> = LazyLock::new(|| element("fields"));
static PICKLIST_VALUES: LazyLock<Regex> = LazyLock::new(|| element("picklistValues"));
static NAME: LazyLock<Regex> = LazyLock::new(|| element("name"));
static LABEL: LazyLock<Regex> = LazyLock::new(|| element("label"));
static VALUE: LazyLock<Regex> = LazyLock::new(|| element("value"));
static ACTIVE: LazyLock<Regex> = LazyLock::new(|| element("active"));
static ID: LazyLock<Regex> = LazyLock::new(|| element("id"));
static FAULTSTRING: LazyLock<Regex> = LazyLock::new(|| element("faultstring"));
static DONE: LazyLock<Regex> = LazyLock::new(|| element("done"));
static SUCCESS: LazyLock<Regex> = LazyLock::new(|| element("success"));
static STATUS: LazyLock<Regex> = LazyLock::new(|| element("status"));
static ERROR_MESSAGE: LazyLock<Regex> = LazyLock::new(|| element("errorMessage"));
static DETAILS: LazyLock<Regex> = LazyLock::new(|| element("details"));
static COMPONENT_FAILURES: LazyLock<Regex> = LazyLock::new(|| element("componentFailures"));
static FULL_NAME: LazyLock<Regex> = LazyLock::new(|| element("fullName"));
static PROBLEM: LazyLock<Regex> = LazyLock::new(|| element("problem"));

/// Text of the first element matched by `rule`, unescaped. Self-closing elements never match.
fn first(rule: &Regex, text: &str) -> Option<String> {
    rule.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| unescape_xml(m.as_str()))
}

/// Raw inner text of every element matched by `rule`, in document order.
fn blocks<'t>(rule: &Regex, text: &'t str) -> Vec<&'t str> {
    rule.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

fn flag(rule: &Regex, text: &str) -> bool {
    first(rule, text).is_some_and(|v| v.trim() == "true")
}

pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

static CHAR_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("character reference pattern is a valid regex")
});

/// Decodes the predefined entities and numeric character references.
pub fn unescape_xml(text: &str) -> String {
    let decoded = CHAR_REFERENCE.replace_all(text, |caps: &regex::Captures| {
        let reference = &caps[1];
        let code = match reference.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => reference.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    decoded
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// First `<faultstring>` in a body, if any.
pub fn fault_string(xml: &str) -> Option<String> {
    first(&FAULTSTRING, xml)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapOperation {
    Describe,
    DeploySubmit,
    DeployStatus,
}

impl SoapOperation {
    pub fn endpoint(&self, connection: &Connection) -> String {
        match self {
            SoapOperation::Describe => connection.partner_soap_url(),
            SoapOperation::DeploySubmit | SoapOperation::DeployStatus => {
                connection.metadata_soap_url()
            }
        }
    }

    /// Wraps an envelope into the POST the endpoint expects.
    pub fn request(&self, connection: &Connection, envelope: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: self.endpoint(connection),
            headers: vec![
                (
                    "Content-Type".to_string(),
                    "text/xml; charset=utf-8".to_string(),
                ),
                ("SOAPAction".to_string(), "\"\"".to_string()),
            ],
            body: Some(envelope),
        }
    }
}

/// Returns the body of a 2xx reply; otherwise the embedded fault text, or the bare status.
pub fn check_response(response: &HttpResponse) -> Result<&str, BridgeError> {
    if response.is_success() {
        return Ok(&response.body);
    }
    match fault_string(&response.body) {
        Some(fault) => Err(BridgeError::RemoteFault(fault)),
        None => Err(BridgeError::TransportFailure {
            status: response.status,
            message: format!("SOAP {}", response.status),
        }),
    }
}

// --- describeSObject ---

pub fn describe_envelope(session_id: &str, locale: &str, object_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soapenv:Envelope xmlns:soapenv="{SOAP_ENVELOPE_NS}" xmlns:urn="{PARTNER_NS}">
  <soapenv:Header>
    <urn:SessionHeader><urn:sessionId>{}</urn:sessionId></urn:SessionHeader>
    <urn:LocaleOptions><urn:language>{}</urn:language></urn:LocaleOptions>
  </soapenv:Header>
  <soapenv:Body>
    <urn:describeSObject><urn:sObjectType>{}</urn:sObjectType></urn:describeSObject>
  </soapenv:Body>
</soapenv:Envelope>"#,
        escape_xml(session_id),
        escape_xml(locale),
        escape_xml(object_name),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PicklistEntry {
    pub value: String,
    pub label: String,
}

/// Field labels and active picklist values of one object in one locale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeResult {
    pub field_labels: BTreeMap<String, String>,
    pub picklist_values: BTreeMap<String, Vec<PicklistEntry>>,
}

pub fn parse_describe(xml: &str) -> Result<DescribeResult, BridgeError> {
    let mut result = DescribeResult::default();
    let field_blocks = blocks(&FIELDS, xml);
    if field_blocks.is_empty() {
        if let Some(fault) = fault_string(xml) {
            return Err(BridgeError::RemoteFault(fault));
        }
    }

    for block in field_blocks {
        // Field-level name/label must not be taken from inside a picklist entry.
        let own = PICKLIST_VALUES.replace_all(block, "");
        let (Some(name), Some(label)) = (first(&NAME, &own), first(&LABEL, &own)) else {
            continue;
        };

        let entries = blocks(&PICKLIST_VALUES, block);
        if !entries.is_empty() {
            let active: Vec<PicklistEntry> = entries
                .into_iter()
                .filter(|entry| flag(&ACTIVE, entry))
                .filter_map(|entry| {
                    Some(PicklistEntry {
                        value: first(&VALUE, entry)?,
                        label: first(&LABEL, entry)?,
                    })
                })
                .collect();
            result.picklist_values.insert(name.clone(), active);
        }
        result.field_labels.insert(name, label);
    }
    Ok(result)
}

// --- deploy ---

pub fn deploy_envelope(session_id: &str, zip_base64: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soapenv:Envelope xmlns:soapenv="{SOAP_ENVELOPE_NS}" xmlns:met="{METADATA_NS}">
  <soapenv:Header>
    <met:SessionHeader><met:sessionId>{}</met:sessionId></met:SessionHeader>
  </soapenv:Header>
  <soapenv:Body>
    <met:deploy>
      <met:ZipFile>{zip_base64}</met:ZipFile>
      <met:DeployOptions>
        <met:rollbackOnError>true</met:rollbackOnError>
        <met:singlePackage>true</met:singlePackage>
      </met:DeployOptions>
    </met:deploy>
  </soapenv:Body>
</soapenv:Envelope>"#,
        escape_xml(session_id),
    )
}

/// Async job id of an accepted deploy.
pub fn parse_deploy_submit(xml: &str) -> Result<String, BridgeError> {
    if let Some(id) = first(&ID, xml).filter(|id| !id.trim().is_empty()) {
        return Ok(id.trim().to_string());
    }
    match fault_string(xml) {
        Some(fault) => Err(BridgeError::RemoteFault(fault)),
        None => Err(BridgeError::RemoteFault("No deploy ID returned".to_string())),
    }
}

// --- checkDeployStatus ---

pub fn deploy_status_envelope(session_id: &str, job_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soapenv:Envelope xmlns:soapenv="{SOAP_ENVELOPE_NS}" xmlns:met="{METADATA_NS}">
  <soapenv:Header>
    <met:SessionHeader><met:sessionId>{}</met:sessionId></met:SessionHeader>
  </soapenv:Header>
  <soapenv:Body>
    <met:checkDeployStatus>
      <met:asyncProcessId>{}</met:asyncProcessId>
      <met:includeDetails>true</met:includeDetails>
    </met:checkDeployStatus>
  </soapenv:Body>
</soapenv:Envelope>"#,
        escape_xml(session_id),
        escape_xml(job_id),
    )
}

/// Which part of a status reply the error message was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorSource {
    /// Top-level `<errorMessage>`.
    ErrorMessage,
    /// A failing component's `<fullName>: <problem>`.
    Component,
    Fault,
}

/// Server-side state of an asynchronous deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployJob {
    pub id: String,
    pub done: bool,
    pub success: bool,
    pub status_label: String,
    pub error_message: Option<String>,
    pub error_source: Option<ErrorSource>,
}

impl DeployJob {
    /// The error a finished, unsuccessful job reports.
    ///
    /// Component problems are `ComponentFailure`; a top-level message or fault is `RemoteFault`.
    /// With nothing to go on the job is a `ComponentFailure("Deploy failed")`.
    pub fn failure(&self) -> BridgeError {
        match (self.error_source, self.error_message.clone()) {
            (Some(ErrorSource::ErrorMessage | ErrorSource::Fault), Some(message)) => {
                BridgeError::RemoteFault(message)
            }
            (_, Some(message)) => BridgeError::ComponentFailure(message),
            (_, None) => BridgeError::ComponentFailure("Deploy failed".to_string()),
        }
    }
}

/// Reads a `checkDeployStatus` reply.
///
/// Flags are read from the top-level result only; per-component `<success>` flags inside
/// `<details>` are ignored. The error message falls back in this order:
/// `<errorMessage>`, first component `<fullName>: <problem>`, `<faultstring>`.
///
/// A reply with no `<done>` element that carries a fault is not a job state at all and fails
/// with `RemoteFault`.
pub fn parse_deploy_status(job_id: &str, xml: &str) -> Result<DeployJob, BridgeError> {
    let top_level = DETAILS.replace_all(xml, "");
    if first(&DONE, &top_level).is_none() {
        if let Some(fault) = fault_string(xml) {
            return Err(BridgeError::RemoteFault(fault));
        }
    }

    let error = first(&ERROR_MESSAGE, &top_level)
        .filter(|m| !m.trim().is_empty())
        .map(|m| (ErrorSource::ErrorMessage, m))
        .or_else(|| component_problem(xml).map(|m| (ErrorSource::Component, m)))
        .or_else(|| fault_string(xml).map(|m| (ErrorSource::Fault, m)));
    let (error_source, error_message) = match error {
        Some((source, message)) => (Some(source), Some(message)),
        None => (None, None),
    };

    Ok(DeployJob {
        id: job_id.to_string(),
        done: flag(&DONE, &top_level),
        success: flag(&SUCCESS, &top_level),
        status_label: first(&STATUS, &top_level).unwrap_or_default(),
        error_message,
        error_source,
    })
}

/// `fullName: problem` of the first failing component.
fn component_problem(xml: &str) -> Option<String> {
    let failures = blocks(&COMPONENT_FAILURES, xml);
    let scopes = if failures.is_empty() { vec![xml] } else { failures };
    scopes.into_iter().find_map(|scope| {
        let problem = first(&PROBLEM, scope)?;
        Some(match first(&FULL_NAME, scope) {
            Some(full_name) => format!("{full_name}: {problem}"),
            None => problem,
        })
    })
}
