//! Integration tests for single-item import

mod common;

use cfgsync_core::types::EntityTypeDefinition;
use cfgsync_core::{ConfigStorage, SharedStorage};
use cfgsync_import::{
    ImportError, ImportStatus, MemoryLockBackend, SingleImport, SingleImportTarget,
};
use common::*;
use std::sync::Arc;
use test_case::test_case;

fn active() -> SharedStorage {
    shared_with(&[
        ("system.site", "uuid: site-1\nname: Foo\n"),
        ("image.style.large", "uuid: style-1\nid: large\nlabel: Large\n"),
    ])
}

fn image_style() -> SingleImportTarget {
    SingleImportTarget::Entity {
        entity_type: EntityTypeDefinition {
            id: "image_style".into(),
            label: "Image style".into(),
            config_prefix: "image.style".into(),
            id_key: "id".into(),
        },
        custom_id: None,
    }
}

fn single_error(result: Result<impl Sized, ImportError>) -> String {
    match result {
        Err(ImportError::Validation { errors }) => {
            assert_eq!(errors.len(), 1, "{:?}", errors);
            errors[0].clone()
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("import was accepted"),
    }
}

#[test]
fn test_simple_config_is_imported() {
    let active = active();
    let prepared = SingleImport::new(active.clone())
        .prepare(
            &SingleImportTarget::Simple {
                name: "system.site".into(),
            },
            "uuid: site-1\nname: Bar\n",
        )
        .unwrap();
    assert!(prepared.exists());
    assert_eq!(prepared.comparer().changelist().update, vec!["system.site"]);

    let mut importer = prepared.into_importer(Arc::new(MemoryLockBackend::new()));
    assert_eq!(
        importer.run(|_, _, _| {}).unwrap(),
        ImportStatus::Completed { steps: 1 }
    );
    assert_eq!(
        active.read("system.site").unwrap().data(),
        &data("uuid: site-1\nname: Bar\n")
    );
    // untouched documents stay in place
    assert!(active.exists("image.style.large").unwrap());
}

#[test]
fn test_new_entity_is_created() {
    let active = active();
    let prepared = SingleImport::new(active.clone())
        .prepare(&image_style(), "uuid: style-2\nid: thumb\nlabel: Thumb\n")
        .unwrap();
    assert_eq!(prepared.name(), "image.style.thumb");
    assert!(!prepared.exists());

    let mut importer = prepared.into_importer(Arc::new(MemoryLockBackend::new()));
    importer.run(|_, _, _| {}).unwrap();
    assert!(active.exists("image.style.thumb").unwrap());
}

#[test_case(
    "label: No id\n",
    "Missing ID key \"id\" for this Image style import." ;
    "missing id"
)]
#[test_case(
    "id: large\nlabel: Large\n",
    "An entity with this machine name already exists but the import did not specify a UUID." ;
    "existing id without uuid"
)]
#[test_case(
    "uuid: other\nid: large\n",
    "An entity with this machine name already exists but the UUID does not match." ;
    "existing id with other uuid"
)]
#[test_case(
    "uuid: style-1\nid: medium\n",
    "An entity with this UUID already exists but the machine name does not match." ;
    "uuid used by other id"
)]
#[test_case(
    "uuid: style-1\nid: large\nlabel: Large\n",
    "There are no changes to import." ;
    "identical entity"
)]
fn test_entity_is_rejected(yaml: &str, expected: &str) {
    let result = SingleImport::new(active()).prepare(&image_style(), yaml);
    assert_eq!(single_error(result), expected);
}

#[test]
fn test_malformed_yaml_is_rejected() {
    let result = SingleImport::new(active()).prepare(
        &SingleImportTarget::Simple {
            name: "system.site".into(),
        },
        "- just\n- a list\n",
    );
    let message = single_error(result);
    assert!(message.starts_with("The import failed with the following message:"));
}

#[test]
fn test_active_storage_is_untouched_until_run() {
    let active = active();
    let _prepared = SingleImport::new(active.clone())
        .prepare(&image_style(), "uuid: style-2\nid: thumb\n")
        .unwrap();
    assert!(!active.exists("image.style.thumb").unwrap());
}
