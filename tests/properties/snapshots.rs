//! Property tests for content hashing and snapshots.

use std::collections::BTreeMap;

use proptest::prelude::*;
use sitekeeper::domain::entities::{ConfigTree, Snapshot, TreeEntry};
use sitekeeper::domain::value_objects::ContentHash;

fn tree() -> impl Strategy<Value = ConfigTree> {
    prop::collection::btree_map(
        "(available|enabled)/sk-[a-z]{1,8}\\.conf",
        prop::collection::vec(any::<u8>(), 0..64).prop_map(TreeEntry::File),
        0..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: A hash parses back from its own text
    #[test]
    fn property_hash_round_trips(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let hash = ContentHash::from_bytes(&bytes);
        prop_assert_eq!(ContentHash::parse(hash.as_str()), Some(hash.clone()));
        prop_assert_eq!(ContentHash::parse(hash.hex()), Some(hash));
    }

    /// PROPERTY: Arbitrary text never parses as a hash unless it is 64 hex digits
    #[test]
    fn property_hash_parse_rejects_garbage(raw in "[g-z0-9]{0,80}") {
        let parsed = ContentHash::parse(&raw);
        let is_hex = raw.len() == 64 && raw.chars().all(|c| c.is_ascii_digit());
        prop_assert_eq!(parsed.is_some(), is_hex);
    }

    /// PROPERTY: Identical trees give identical snapshot ids
    #[test]
    fn property_snapshot_id_is_content_addressed(tree in tree()) {
        let (a, _) = Snapshot::from_tree(&tree);
        let (b, _) = Snapshot::from_tree(&tree.clone());
        prop_assert_eq!(a.id(), b.id());
    }

    /// PROPERTY: Changing any entry changes the snapshot id
    #[test]
    fn property_snapshot_id_tracks_changes(tree in tree(), extra in any::<u8>()) {
        prop_assume!(!tree.is_empty());
        let (before, _) = Snapshot::from_tree(&tree);

        let mut changed: BTreeMap<_, _> = tree.clone();
        if let Some((_, TreeEntry::File(bytes))) = changed.iter_mut().next() {
            bytes.push(extra);
        }
        let (after, _) = Snapshot::from_tree(&changed);
        prop_assert_ne!(before.id(), after.id());
    }

    /// PROPERTY: Equal blobs are referenced by the same hash
    #[test]
    fn property_equal_blobs_share_hash(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut tree = ConfigTree::new();
        tree.insert("available/sk-a.conf".to_string(), TreeEntry::File(bytes.clone()));
        tree.insert("available/sk-b.conf".to_string(), TreeEntry::File(bytes));
        let (snapshot, blobs) = Snapshot::from_tree(&tree);
        prop_assert_eq!(blobs[0].0.clone(), blobs[1].0.clone());
        let hashes: Vec<_> = snapshot.entries.values().map(|e| e.hash.clone()).collect();
        prop_assert_eq!(&hashes[0], &hashes[1]);
    }
}
