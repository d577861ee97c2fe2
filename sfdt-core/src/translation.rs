//! Translation payloads and the mdapi-format package they deploy as.
//!
//! A field translation ships as a `CustomObjectTranslation` file placed flat in
//! `objectTranslations/` (no per-object sub-directory, `.objectTranslation` suffix), with the
//! field translation embedded as a `<fields>` element, plus a `package.xml` naming that single
//! member.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveBuilder, ArchiveEntry};
use crate::error::BridgeError;
use crate::soap::{escape_xml, METADATA_NS};

pub const TRANSLATIONS_DIR: &str = "objectTranslations/";
pub const PACKAGE_MANIFEST: &str = "package.xml";

/// Metadata file suffix for a locale code.
pub fn locale_suffix(locale: &str) -> &str {
    match locale {
        "en" => "en_US",
        "es" => "es",
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PicklistTranslation {
    pub master_label: String,
    pub translation: String,
}

/// One field's translated label and/or picklist labels for one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationPayload {
    pub object_name: String,
    pub field_api_name: String,
    pub locale: String,
    pub label: Option<String>,
    pub picklist_values: Option<Vec<PicklistTranslation>>,
}

impl TranslationPayload {
    pub fn new(
        object_name: impl Into<String>,
        field_api_name: impl Into<String>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            object_name: object_name.into(),
            field_api_name: field_api_name.into(),
            locale: locale.into(),
            label: None,
            picklist_values: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// An empty list leaves the payload without picklist translations.
    pub fn with_picklist_values(mut self, values: Vec<PicklistTranslation>) -> Self {
        self.picklist_values = (!values.is_empty()).then_some(values);
        self
    }

    /// `Account-en_US`
    pub fn member_name(&self) -> String {
        format!("{}-{}", self.object_name, locale_suffix(&self.locale))
    }

    pub fn translation_path(&self) -> String {
        format!("{TRANSLATIONS_DIR}{}.objectTranslation", self.member_name())
    }

    pub fn object_translation_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!("<CustomObjectTranslation xmlns=\"{METADATA_NS}\">\n"));
        xml.push_str("    <fields>\n");
        if let Some(label) = &self.label {
            xml.push_str(&format!("        <label>{}</label>\n", escape_xml(label)));
        }
        xml.push_str(&format!("        <name>{}</name>\n", self.field_api_name));
        for pv in self.picklist_values.iter().flatten() {
            xml.push_str("        <picklistValues>\n");
            xml.push_str(&format!(
                "            <masterLabel>{}</masterLabel>\n",
                escape_xml(&pv.master_label)
            ));
            xml.push_str(&format!(
                "            <translation>{}</translation>\n",
                escape_xml(&pv.translation)
            ));
            xml.push_str("        </picklistValues>\n");
        }
        xml.push_str("    </fields>\n");
        xml.push_str("</CustomObjectTranslation>\n");
        xml
    }

    pub fn package_xml(&self, api_version: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Package xmlns="{METADATA_NS}">
    <types>
        <members>{}</members>
        <name>CustomObjectTranslation</name>
    </types>
    <version>{api_version}</version>
</Package>
"#,
            self.member_name()
        )
    }

    pub fn archive_entries(&self, api_version: &str) -> Vec<ArchiveEntry> {
        vec![
            ArchiveEntry::directory(TRANSLATIONS_DIR),
            ArchiveEntry::file(self.translation_path(), self.object_translation_xml()),
            ArchiveEntry::file(PACKAGE_MANIFEST, self.package_xml(api_version)),
        ]
    }

    pub fn build_archive(&self, api_version: &str) -> Result<Vec<u8>, BridgeError> {
        self.archive_entries(api_version)
            .into_iter()
            .fold(ArchiveBuilder::new(), ArchiveBuilder::add)
            .build()
    }

    /// Base64 of the deployable archive, as carried inside the deploy envelope.
    pub fn archive_base64(&self, api_version: &str) -> Result<String, BridgeError> {
        Ok(STANDARD.encode(self.build_archive(api_version)?))
    }
}
