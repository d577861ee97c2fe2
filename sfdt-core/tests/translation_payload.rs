use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sfdt_core::translation::{locale_suffix, PicklistTranslation, TranslationPayload};

fn picklist(master: &str, translation: &str) -> PicklistTranslation {
    PicklistTranslation {
        master_label: master.to_string(),
        translation: translation.to_string(),
    }
}

#[test]
fn locale_suffix_maps_english_to_en_us() {
    assert_eq!(locale_suffix("en"), "en_US");
    assert_eq!(locale_suffix("es"), "es");
    assert_eq!(locale_suffix("fr"), "fr");
    assert_eq!(locale_suffix("pt_BR"), "pt_BR");
}

#[test]
fn translation_file_sits_flat_in_object_translations() {
    let payload = TranslationPayload::new("Account", "Rating__c", "en");
    assert_eq!(payload.member_name(), "Account-en_US");
    assert_eq!(
        payload.translation_path(),
        "objectTranslations/Account-en_US.objectTranslation"
    );
}

#[test]
fn label_only_payload_omits_picklist_values() {
    let xml = TranslationPayload::new("Account", "Rating__c", "es")
        .with_label("Calificación <VIP>")
        .object_translation_xml();

    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains(
        "<CustomObjectTranslation xmlns=\"http://soap.sforce.com/2006/04/metadata\">"
    ));
    assert!(xml.contains("<label>Calificación &lt;VIP&gt;</label>"));
    assert!(xml.contains("<name>Rating__c</name>"));
    assert!(!xml.contains("<picklistValues>"));
}

#[test]
fn picklist_only_payload_omits_label() {
    let xml = TranslationPayload::new("Account", "Rating__c", "es")
        .with_picklist_values(vec![
            picklist("Hot", "Caliente"),
            picklist("R&D", "I+D"),
        ])
        .object_translation_xml();

    assert!(!xml.contains("<label>"));
    let hot = xml.find("<masterLabel>Hot</masterLabel>").expect("hot entry");
    let rnd = xml.find("<masterLabel>R&amp;D</masterLabel>").expect("escaped entry");
    assert!(hot < rnd, "entries keep their input order");
    assert!(xml.contains("<translation>Caliente</translation>"));
    assert!(xml.contains("<translation>I+D</translation>"));
}

#[test]
fn empty_picklist_list_is_treated_as_absent() {
    let payload = TranslationPayload::new("Account", "Rating__c", "es").with_picklist_values(vec![]);
    assert_eq!(payload.picklist_values, None);
}

#[test]
fn package_manifest_names_single_member_and_version() {
    let xml = TranslationPayload::new("Contact", "Level__c", "en").package_xml("62.0");
    assert!(xml.contains("<members>Contact-en_US</members>"));
    assert!(xml.contains("<name>CustomObjectTranslation</name>"));
    assert!(xml.contains("<version>62.0</version>"));
    assert_eq!(xml.matches("<members>").count(), 1);
}

#[test]
fn archive_entries_are_directory_translation_then_manifest() {
    let payload = TranslationPayload::new("Account", "Rating__c", "es").with_label("Calificación");
    let names: Vec<String> = payload
        .archive_entries("62.0")
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(
        names,
        vec![
            "objectTranslations/".to_string(),
            "objectTranslations/Account-es.objectTranslation".to_string(),
            "package.xml".to_string(),
        ]
    );
}

#[test]
fn base64_archive_decodes_to_a_zip() {
    let payload = TranslationPayload::new("Account", "Rating__c", "es").with_label("Calificación");
    let encoded = payload.archive_base64("62.0").unwrap();
    let bytes = STANDARD.decode(encoded).unwrap();
    assert_eq!(&bytes[..4], b"PK\x03\x04");
    assert_eq!(bytes, payload.build_archive("62.0").unwrap());
}
