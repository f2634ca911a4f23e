mod common;

use bastion_core::commands::CommandDescriptor;
use common::*;
use toml_edit::DocumentMut;

fn descriptors() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor::of::<Home>(),
        CommandDescriptor::of::<SetHome>(),
        CommandDescriptor::of::<Warp>(),
    ]
}

#[tokio::test]
async fn first_start_writes_disabled_commands() {
    let harness = Harness::new("", descriptors());
    let doc: DocumentMut = harness.commands_file().parse().unwrap();

    assert_eq!(doc["home"]["enabled"].as_bool(), Some(false));
    assert_eq!(doc["home"]["root level aliases"]["home"].as_bool(), Some(true));
    assert_eq!(doc["home"]["root level aliases"]["homes"].as_bool(), Some(false));
    assert_eq!(doc["home.set"]["root level aliases"]["sethome"].as_bool(), Some(true));
    assert_eq!(doc["warp"]["warmup"].as_integer(), Some(0));
    assert_eq!(doc["warp"]["cooldown"].as_integer(), Some(0));
    assert_eq!(doc["warp"]["cost"].as_float(), Some(0.0));

    let tree = harness.service.tree().unwrap();
    assert!(tree.roots().is_empty());
    assert!(tree.instances().is_empty());
}

#[tokio::test]
async fn reconcile_leaves_reconciled_file_alone() {
    let mut harness = Harness::new(&enabled(&["home"]), descriptors());
    let written = harness.commands_file();

    harness.service.reload().unwrap();
    assert_eq!(harness.commands_file(), written);
    harness.service.complete_registration_phase().unwrap();
    assert_eq!(harness.commands_file(), written);
}

#[tokio::test]
async fn operator_edits_are_preserved() {
    let harness = Harness::new(
        "# operator notes\n[home]\nenabled = true\n\"root level aliases\" = { home = false, house = true }\n\n[warp]\nenabled = true\ncooldown = 30\n",
        descriptors(),
    );
    let text = harness.commands_file();
    assert!(text.starts_with("# operator notes\n[home]\nenabled = true\n"));

    let doc: DocumentMut = text.parse().unwrap();
    assert_eq!(doc["home"]["root level aliases"]["home"].as_bool(), Some(false));
    assert_eq!(doc["home"]["root level aliases"]["h"].as_bool(), Some(true));
    assert_eq!(doc["warp"]["cooldown"].as_integer(), Some(30));
    assert_eq!(doc["warp"]["warmup"].as_integer(), Some(0));

    let tree = harness.service.tree().unwrap();
    let home = tree.roots().iter().find(|root| root.control.command_key().as_str() == "home").unwrap();
    assert_eq!(home.aliases().collect::<Vec<_>>(), ["h", "house"]);
    assert_eq!(tree.control("warp").unwrap().modifier_config().cooldown, 30);
}

#[tokio::test]
async fn unreadable_file_is_fatal_at_startup() {
    let mut harness = Harness::registering("[home\n", descriptors());
    assert!(harness.service.complete_registration_phase().is_err());
    assert!(harness.service.tree().is_none());
}

#[tokio::test]
async fn failed_reload_keeps_previous_configuration() {
    let harness = Harness::new(&enabled(&["warp"]), descriptors());
    harness.write_commands_file("[\"warp\"]\nenabled = true\ncooldown = 12\n");
    harness.service.reload().unwrap();
    assert_eq!(harness.service.control("warp").unwrap().modifier_config().cooldown, 12);

    harness.write_commands_file("[warp\ncooldown = ");
    assert!(harness.service.reload().is_err());
    assert_eq!(harness.service.control("warp").unwrap().modifier_config().cooldown, 12);
    assert!(harness.service.tree().unwrap().root("warp").is_some());
}
