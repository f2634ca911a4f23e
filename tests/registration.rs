mod common;

use bastion_core::commands::{CommandDescriptor, CommandKey, RegistrationError};
use common::*;

#[tokio::test]
async fn keys_join_canonical_aliases() {
    let harness = Harness::registering(
        "",
        vec![
            CommandDescriptor::of::<Home>(),
            CommandDescriptor::of::<SetHome>(),
            CommandDescriptor::of::<Admin>(),
            CommandDescriptor::of::<AdminReload>(),
        ],
    );
    let keys: Vec<_> = harness
        .service
        .registry()
        .metadata()
        .map(|metadata| metadata.key().to_string())
        .collect();
    assert_eq!(keys, ["home", "home.set", "admin", "admin.reload"]);

    let set = harness.service.registry().get("home.set").unwrap();
    assert_eq!(set.canonical_alias(), "set");
    assert_eq!(set.sub_aliases(), ["set"]);
    assert_eq!(set.root_aliases(), ["sethome"]);
    assert_eq!(set.module_id(), "test");
}

#[tokio::test]
async fn parent_cycle_aborts_before_any_tree_exists() {
    let mut harness = Harness::registering("", vec![CommandDescriptor::of::<Home>()]);
    let err = harness
        .service
        .register_command("test", "Test", CommandDescriptor::of::<Cycle>())
        .unwrap_err();
    match err {
        RegistrationError::CircularParent { chain } => {
            assert!(chain.first().unwrap().ends_with("CycleBack"));
            assert!(chain.last().unwrap().ends_with("CycleBack"));
        }
        other => panic!("expected a circular parent error, got {other:?}"),
    }
    assert!(harness.service.tree().is_none());
    assert!(!harness.commands_path().exists());
}

#[tokio::test]
async fn duplicates_are_rejected() {
    let mut harness = Harness::registering("", vec![CommandDescriptor::of::<Ban>()]);
    assert!(matches!(
        harness
            .service
            .register_command("other", "Other", CommandDescriptor::of::<Ban>()),
        Err(RegistrationError::Duplicate { key }) if key == "ban"
    ));
}

#[tokio::test]
async fn registration_closes_when_complete() {
    let mut harness = Harness::new("", vec![CommandDescriptor::of::<Ban>()]);
    assert!(harness.service.registry().is_finalized());
    assert!(matches!(
        harness
            .service
            .register_command("test", "Test", CommandDescriptor::of::<Pay>()),
        Err(RegistrationError::AlreadyFinalized)
    ));
    assert_eq!(
        harness.service.registry().get("ban").map(|m| m.key().clone()),
        Some(CommandKey::from("ban"))
    );
}
