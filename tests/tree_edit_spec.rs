use std::sync::Mutex;

use kickstart_store::db::Database;
use kickstart_store::models::*;
use kickstart_store::sync::TreeSync;
use kickstart_store::tree_edit::{TreeEditOperation, INVALID_LABEL_KEY};
use kickstart_store::{KickstartError, Result};

/// Remembers every tree it was asked to sync.
#[derive(Default)]
struct RecordingSync {
    stored: Mutex<Vec<Tree>>,
    fail: bool,
}

impl RecordingSync {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Tree> {
        self.stored.lock().unwrap().clone()
    }
}

impl TreeSync for RecordingSync {
    fn store(&self, tree: &Tree) -> Result<()> {
        self.stored.lock().unwrap().push(tree.clone());
        if self.fail {
            return Err(KickstartError::Sync("provisioning server unreachable".into()));
        }
        Ok(())
    }
}

struct Fixture {
    db: Database,
    org: Org,
    channel: Channel,
}

fn setup() -> Fixture {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let org = db.create_org("Acme").expect("Failed to create org");
    let channel = db
        .create_channel(CreateChannelInput {
            label: "rhel-5-server".to_string(),
            name: "RHEL 5 Server".to_string(),
            org_id: None,
            parent_channel_id: None,
            is_tools: false,
            versions: vec![ChannelVersion::Rhel4, ChannelVersion::Rhel5],
        })
        .expect("Failed to create channel");
    Fixture { db, org, channel }
}

fn save_tree(fx: &Fixture, label: &str) -> Tree {
    let reference = fx.db.reference_data().unwrap();
    let install_type = fx
        .db
        .lookup_install_type_by_label(InstallType::RHEL_5)
        .unwrap()
        .unwrap();
    let mut tree = Tree::new(
        label,
        "http://mirror.example/rhel5",
        fx.channel.id,
        install_type,
        reference.tree_type_managed,
        Some(fx.org.id),
    );
    fx.db.save_tree(&mut tree).unwrap();
    tree
}

fn user(fx: &Fixture) -> User {
    User::new("admin", fx.org.id)
}

mod store {
    use super::*;

    #[test]
    fn persists_a_valid_edit_and_syncs_once() {
        let fx = setup();
        save_tree(&fx, "ks-rhel-5");
        let sync = RecordingSync::default();

        let mut op = TreeEditOperation::for_label(&fx.db, "ks-rhel-5", user(&fx), &sync).unwrap();
        op.set_label("ks-rhel-5-u2").unwrap();
        op.set_base_path("http://mirror.example/rhel5u2").unwrap();
        let result = op.store().unwrap();

        assert!(result.is_none());
        let calls = sync.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].label, "ks-rhel-5-u2");

        let stored = fx
            .db
            .lookup_tree_by_label("ks-rhel-5-u2", fx.org.id)
            .unwrap()
            .expect("Edited tree not found");
        assert_eq!(stored.base_path, "http://mirror.example/rhel5u2");
        assert!(fx.db.lookup_tree_by_label("ks-rhel-5", fx.org.id).unwrap().is_none());
    }

    #[test]
    fn rejects_an_invalid_label_without_syncing() {
        let fx = setup();
        let original = save_tree(&fx, "ks-rhel-5");
        let sync = RecordingSync::default();

        let mut op = TreeEditOperation::for_label(&fx.db, "ks-rhel-5", user(&fx), &sync).unwrap();
        op.set_label("not a valid label!").unwrap();
        op.set_boot_image("other-koan").unwrap();
        let result = op.store().unwrap();

        assert_eq!(result.map(|e| e.key), Some(INVALID_LABEL_KEY.to_string()));
        assert!(sync.calls().is_empty());
        assert_eq!(op.tree().map(|t| t.label.as_str()), Some("ks-rhel-5"));
        assert_eq!(op.tree().map(|t| t.boot_image.as_str()), Some(original.boot_image.as_str()));

        let stored = fx.db.lookup_tree_by_label("ks-rhel-5", fx.org.id).unwrap().unwrap();
        assert_eq!(stored.boot_image, original.boot_image);
    }

    #[test]
    fn rejects_an_empty_label() {
        let fx = setup();
        save_tree(&fx, "ks-rhel-5");
        let sync = RecordingSync::default();

        let mut op = TreeEditOperation::for_label(&fx.db, "ks-rhel-5", user(&fx), &sync).unwrap();
        op.set_label("").unwrap();

        assert!(!op.validate_label());
        assert!(op.store().unwrap().is_some());
        assert!(sync.calls().is_empty());
    }

    #[test]
    fn creates_a_new_tree() {
        let fx = setup();
        let sync = RecordingSync::default();
        let reference = fx.db.reference_data().unwrap();
        let install_type = fx
            .db
            .lookup_install_type_by_label(InstallType::RHEL_4)
            .unwrap()
            .unwrap();
        let tree = Tree::new(
            "ks-rhel-4",
            "http://mirror.example/rhel4",
            fx.channel.id,
            install_type,
            reference.tree_type_external,
            Some(fx.org.id),
        );

        let mut op = TreeEditOperation::new(&fx.db, user(&fx), tree, &sync);
        assert!(op.store().unwrap().is_none());

        let id = op.tree().and_then(|t| t.id).expect("Tree was not assigned an id");
        let stored = fx.db.lookup_tree_by_id_and_org(id, fx.org.id).unwrap().unwrap();
        assert_eq!(stored.label, "ks-rhel-4");
        assert_eq!(sync.calls().len(), 1);
    }

    #[test]
    fn propagates_sync_failures_after_saving() {
        let fx = setup();
        save_tree(&fx, "ks-rhel-5");
        let sync = RecordingSync::failing();

        let mut op = TreeEditOperation::for_label(&fx.db, "ks-rhel-5", user(&fx), &sync).unwrap();
        op.set_boot_image("new-koan").unwrap();
        let result = op.store();

        assert!(matches!(result, Err(KickstartError::Sync(_))));
        let stored = fx.db.lookup_tree_by_label("ks-rhel-5", fx.org.id).unwrap().unwrap();
        assert_eq!(stored.boot_image, "new-koan");
    }

    #[test]
    fn reports_a_missing_tree() {
        let fx = setup();
        let sync = RecordingSync::default();

        let mut op = TreeEditOperation::for_label(&fx.db, "nope", user(&fx), &sync).unwrap();

        assert!(op.tree().is_none());
        assert!(!op.validate_label());
        assert!(matches!(op.set_label("x"), Err(KickstartError::NotFound(_))));
        assert!(matches!(op.store(), Err(KickstartError::NotFound(_))));
    }
}

mod channel_queries {
    use super::*;

    fn add_tools_channel(fx: &Fixture) -> Channel {
        fx.db
            .create_channel(CreateChannelInput {
                label: "rhn-tools-rhel-5".to_string(),
                name: "RHN Tools".to_string(),
                org_id: None,
                parent_channel_id: Some(fx.channel.id),
                is_tools: true,
                versions: vec![],
            })
            .unwrap()
    }

    #[test]
    fn strips_the_legacy_prefix_from_kickstart_packages() {
        let fx = setup();
        let tools = add_tools_channel(&fx);
        fx.db
            .create_package(CreatePackageInput {
                name: "auto-kickstart-ks-rhel-i386-server-5".to_string(),
                capabilities: vec!["rhn.kickstart.boot_image".to_string()],
                channel_ids: vec![tools.id],
            })
            .unwrap();
        fx.db
            .create_package(CreatePackageInput {
                name: "koan".to_string(),
                capabilities: vec![],
                channel_ids: vec![tools.id],
            })
            .unwrap();
        let sync = RecordingSync::default();
        let op = TreeEditOperation::for_label(&fx.db, "any", user(&fx), &sync).unwrap();

        let all: Vec<_> = op
            .auto_kickstart_package_names()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        let in_channel: Vec<_> = op
            .kickstart_package_names_for_channel(&fx.channel)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();

        assert_eq!(all, ["ks-rhel-i386-server-5"]);
        assert_eq!(in_channel, ["ks-rhel-i386-server-5"]);
    }

    #[test]
    fn returns_no_packages_without_a_tools_channel() {
        let fx = setup();
        let sync = RecordingSync::default();
        let op = TreeEditOperation::for_label(&fx.db, "any", user(&fx), &sync).unwrap();

        let packages = op.kickstart_package_names_for_channel(&fx.channel).unwrap();

        assert!(packages.is_empty());
    }

    #[test]
    fn filters_install_types_by_channel_version() {
        let fx = setup();
        let sync = RecordingSync::default();
        let op = TreeEditOperation::for_label(&fx.db, "any", user(&fx), &sync).unwrap();

        let labels: Vec<_> = op
            .kickstart_install_types_for_channel(&fx.channel)
            .unwrap()
            .into_iter()
            .map(|t| t.label)
            .collect();

        assert!(labels.contains(&InstallType::RHEL_4.to_string()));
        assert!(labels.contains(&InstallType::RHEL_5.to_string()));
        assert!(!labels.contains(&InstallType::RHEL_3.to_string()));
        assert!(!labels.contains(&InstallType::FEDORA.to_string()));
    }

    #[test]
    fn lists_base_channels_only() {
        let fx = setup();
        add_tools_channel(&fx);
        let sync = RecordingSync::default();
        let op = TreeEditOperation::for_label(&fx.db, "any", user(&fx), &sync).unwrap();

        let channels = op.kickstartable_channels().unwrap();

        assert_eq!(channels, vec![fx.channel.clone()]);
    }
}
