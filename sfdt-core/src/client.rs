//! Calls against one resolved org: SOAP describe/deploy operations and ad-hoc REST requests.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::connection::Connection;
use crate::contract::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::error::BridgeError;
use crate::soap::{self, DeployJob, DescribeResult, SoapOperation};

/// Field label of one field in English and Spanish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTranslations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es: Option<String>,
}

/// One active picklist value and its label in French, English and Spanish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PicklistValueTranslation {
    pub value: String,
    pub fr: String,
    pub en: String,
    pub es: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApexClassSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowSummary {
    pub id: String,
    pub master_label: String,
    #[serde(default)]
    pub process_type: String,
}

pub struct OrgClient<'a, T> {
    connection: &'a Connection,
    transport: &'a T,
}

/// Percent-encodes a query-string component.
fn encode_component(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

impl<'a, T: Transport> OrgClient<'a, T> {
    pub fn new(connection: &'a Connection, transport: &'a T) -> Self {
        Self {
            connection,
            transport,
        }
    }

    pub fn connection(&self) -> &Connection {
        self.connection
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BridgeError> {
        debug!(method = request.method.as_str(), url = %request.url, "Sending request");
        self.transport.send(request).await.map_err(|e| {
            error!(error = %e, "Transport failed before a response arrived");
            BridgeError::unreachable(e)
        })
    }

    async fn soap(&self, operation: SoapOperation, envelope: String) -> Result<String, BridgeError> {
        let response = self
            .send(operation.request(self.connection, envelope))
            .await?;
        let body = soap::check_response(&response).map_err(|e| {
            error!(?operation, status = response.status, error = %e, "SOAP call failed");
            e
        })?;
        Ok(body.to_string())
    }

    /// Field labels and active picklist values of `object_name` as seen in `locale`.
    pub async fn describe_for_locale(
        &self,
        object_name: &str,
        locale: &str,
    ) -> Result<DescribeResult, BridgeError> {
        info!(object = object_name, locale, "Describing object");
        let envelope =
            soap::describe_envelope(&self.connection.session_id, locale, object_name);
        let body = self.soap(SoapOperation::Describe, envelope).await?;
        let result = soap::parse_describe(&body)?;
        debug!(
            object = object_name,
            locale,
            fields = result.field_labels.len(),
            picklists = result.picklist_values.len(),
            "Parsed describe reply"
        );
        Ok(result)
    }

    /// The field's label in `en_US` and `es`, described concurrently.
    pub async fn field_translations(
        &self,
        object_name: &str,
        field_api_name: &str,
    ) -> Result<FieldTranslations, BridgeError> {
        let (en, es) = futures::try_join!(
            self.describe_for_locale(object_name, "en_US"),
            self.describe_for_locale(object_name, "es"),
        )?;
        Ok(FieldTranslations {
            en: en.field_labels.get(field_api_name).cloned(),
            es: es.field_labels.get(field_api_name).cloned(),
        })
    }

    /// Every active value of the field, keyed on the French describe, with its `en`/`es` labels.
    pub async fn picklist_translations(
        &self,
        object_name: &str,
        field_api_name: &str,
    ) -> Result<Vec<PicklistValueTranslation>, BridgeError> {
        let (fr, en, es) = futures::try_join!(
            self.describe_for_locale(object_name, "fr"),
            self.describe_for_locale(object_name, "en_US"),
            self.describe_for_locale(object_name, "es"),
        )?;

        let labels_by_value = |result: &DescribeResult| -> HashMap<String, String> {
            result
                .picklist_values
                .get(field_api_name)
                .into_iter()
                .flatten()
                .map(|entry| (entry.value.clone(), entry.label.clone()))
                .collect()
        };
        let en_labels = labels_by_value(&en);
        let es_labels = labels_by_value(&es);

        Ok(fr
            .picklist_values
            .get(field_api_name)
            .into_iter()
            .flatten()
            .map(|entry| PicklistValueTranslation {
                value: entry.value.clone(),
                fr: entry.label.clone(),
                en: en_labels.get(&entry.value).cloned().unwrap_or_default(),
                es: es_labels.get(&entry.value).cloned().unwrap_or_default(),
            })
            .collect())
    }

    /// Starts a metadata deploy and returns its async job id.
    pub async fn submit_deploy(&self, zip_base64: &str) -> Result<String, BridgeError> {
        let envelope = soap::deploy_envelope(&self.connection.session_id, zip_base64);
        let body = self.soap(SoapOperation::DeploySubmit, envelope).await?;
        let job_id = soap::parse_deploy_submit(&body)?;
        info!(job_id = %job_id, "Deploy accepted");
        Ok(job_id)
    }

    pub async fn check_deploy_status(&self, job_id: &str) -> Result<DeployJob, BridgeError> {
        let envelope = soap::deploy_status_envelope(&self.connection.session_id, job_id);
        let body = self.soap(SoapOperation::DeployStatus, envelope).await?;
        soap::parse_deploy_status(job_id, &body)
    }

    /// Issues a REST call against `instance_url + path` with the session as bearer token.
    ///
    /// A non-2xx reply fails with the serialised JSON body as its message.
    pub async fn rest_request(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<String>,
    ) -> Result<serde_json::Value, BridgeError> {
        let request = HttpRequest {
            method,
            url: format!("{}{}", self.connection.instance_url, path),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.connection.session_id),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body,
        };
        let response = self.send(request).await?;
        let parsed: Result<serde_json::Value, serde_json::Error> = if response.body.trim().is_empty() {
            Ok(serde_json::Value::Null)
        } else {
            serde_json::from_str(&response.body)
        };
        if !response.is_success() {
            error!(status = response.status, path, "REST call failed");
            let message = match &parsed {
                Ok(data) => data.to_string(),
                Err(_) => response.body.clone(),
            };
            return Err(BridgeError::TransportFailure {
                status: response.status,
                message,
            });
        }
        parsed.map_err(|e| BridgeError::InvalidResponse(e.to_string()))
    }

    /// Runs a SOQL query through the REST API.
    pub async fn query(&self, soql: &str) -> Result<serde_json::Value, BridgeError> {
        let path = format!(
            "{}/query/?q={}",
            self.connection.rest_base_path(),
            encode_component(soql)
        );
        self.rest_request(&path, HttpMethod::Get, None).await
    }

    /// Next page of a query, from the `nextRecordsUrl` of the previous page.
    pub async fn query_more(&self, next_records_url: &str) -> Result<serde_json::Value, BridgeError> {
        self.rest_request(next_records_url, HttpMethod::Get, None).await
    }

    /// REST describe of an SObject.
    pub async fn describe_sobject(&self, sobject: &str) -> Result<serde_json::Value, BridgeError> {
        let path = format!(
            "{}/sobjects/{sobject}/describe",
            self.connection.rest_base_path()
        );
        self.rest_request(&path, HttpMethod::Get, None).await
    }

    /// Every SObject in the org.
    pub async fn describe_global(&self) -> Result<serde_json::Value, BridgeError> {
        let path = format!("{}/sobjects/", self.connection.rest_base_path());
        self.rest_request(&path, HttpMethod::Get, None).await
    }

    /// Org limits keyed by name, each with `Max` and `Remaining`.
    pub async fn limits(&self) -> Result<serde_json::Value, BridgeError> {
        let path = format!("{}/limits/", self.connection.rest_base_path());
        self.rest_request(&path, HttpMethod::Get, None).await
    }

    // --- Tooling API ---

    pub async fn tooling_query(&self, soql: &str) -> Result<serde_json::Value, BridgeError> {
        let path = format!(
            "{}/tooling/query/?q={}",
            self.connection.rest_base_path(),
            encode_component(soql)
        );
        self.rest_request(&path, HttpMethod::Get, None).await
    }

    async fn tooling_records(&self, soql: &str) -> Result<Vec<serde_json::Value>, BridgeError> {
        let data = self.tooling_query(soql).await?;
        match data.get("records") {
            Some(serde_json::Value::Array(records)) => Ok(records.clone()),
            _ => Err(BridgeError::InvalidResponse(
                "tooling query reply has no records array".to_string(),
            )),
        }
    }

    /// `CustomField` row (including `Metadata`) of a custom field, by developer name.
    pub async fn custom_field_definition(
        &self,
        object_name: &str,
        field_developer_name: &str,
    ) -> Result<Option<serde_json::Value>, BridgeError> {
        let soql = format!(
            "SELECT Id, DeveloperName, FullName, TableEnumOrId, Metadata FROM CustomField \
             WHERE DeveloperName = '{}' AND TableEnumOrId = '{}' LIMIT 1",
            soql_literal(field_developer_name),
            soql_literal(object_name)
        );
        Ok(self.tooling_records(&soql).await?.into_iter().next())
    }

    /// `FieldDefinition` row of a standard or custom field.
    pub async fn field_definition(
        &self,
        object_name: &str,
        field_name: &str,
    ) -> Result<Option<serde_json::Value>, BridgeError> {
        let soql = format!(
            "SELECT QualifiedApiName, DurableId, Label, Description, InlineHelpText, DataType, \
             IsCompound, IsFieldHistoryTracked, IsIndexed, BusinessOwnerId, BusinessStatus, \
             SecurityClassification, ComplianceGroup FROM FieldDefinition \
             WHERE EntityDefinition.QualifiedApiName = '{}' AND QualifiedApiName = '{}' LIMIT 1",
            soql_literal(object_name),
            soql_literal(field_name)
        );
        Ok(self.tooling_records(&soql).await?.into_iter().next())
    }

    /// Up to 20 Apex classes whose name contains `search`, ordered by name.
    pub async fn search_apex_classes(&self, search: &str) -> Result<Vec<ApexClassSummary>, BridgeError> {
        let soql = format!(
            "SELECT Id, Name, Status FROM ApexClass WHERE Name LIKE '%{}%' ORDER BY Name LIMIT 20",
            soql_literal(search)
        );
        self.typed_records(&soql).await
    }

    /// Up to 20 flows whose label contains `search`, ordered by label.
    pub async fn search_flows(&self, search: &str) -> Result<Vec<FlowSummary>, BridgeError> {
        let soql = format!(
            "SELECT Id, MasterLabel, ProcessType FROM FlowDefinition WHERE MasterLabel LIKE '%{}%' \
             ORDER BY MasterLabel LIMIT 20",
            soql_literal(search)
        );
        self.typed_records(&soql).await
    }

    async fn typed_records<R: DeserializeOwned>(&self, soql: &str) -> Result<Vec<R>, BridgeError> {
        self.tooling_records(soql)
            .await?
            .into_iter()
            .map(|record| {
                serde_json::from_value(record)
                    .map_err(|e| BridgeError::InvalidResponse(e.to_string()))
            })
            .collect()
    }
}

/// Quotes and backslashes escaped for a single-quoted SOQL string.
pub fn soql_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
