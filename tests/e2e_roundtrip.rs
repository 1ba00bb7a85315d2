//! Round-trip tests: export → import → export must reproduce the stream.
//!
//! Nothing here is referenceable, so no identities travel and the two
//! exports are directly comparable even though every node was recreated.

use content_tree::model::names;
use content_tree::{
    ContentStore, ExportOptions, ImportOptions, MemoryStore, NodeId, Property, Repository,
    SerializedEvent,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn export(repo: &Repository<MemoryStore>, path: &str) -> Vec<SerializedEvent> {
    repo.export(path, &ExportOptions::default()).unwrap()
}

/// /a { b { d }, c } and /other, with references in every direction.
fn seeded() -> Repository<MemoryStore> {
    let repo = Repository::open_memory();
    {
        let mut store = repo.write();
        let root = store.root_id();
        let a = store.add_child(root, "a", names::NT_UNSTRUCTURED).unwrap();
        let b = store.add_child(a, "b", names::NT_UNSTRUCTURED).unwrap();
        let c = store.add_child(a, "c", names::NT_UNSTRUCTURED).unwrap();
        let d = store.add_child(b, "d", names::NT_UNSTRUCTURED).unwrap();
        let other = store.add_child(root, "other", names::NT_UNSTRUCTURED).unwrap();

        store.set_property(a, Property::single("title", "Home")).unwrap();
        store.set_property(a, Property::references("nav", [b, c, d])).unwrap();
        store.set_property(d, Property::reference("up", a)).unwrap();
        store.set_property(c, Property::reference("ext", other)).unwrap();
        store.set_property(c, Property::single("rank", 3)).unwrap();
    }
    repo
}

// ============================================================================
// 1. In-memory round trip into a fresh repository
// ============================================================================

#[test]
fn test_roundtrip_same_location() {
    let src = seeded();
    let first = export(&src, "/a");

    let dst = Repository::open_memory();
    {
        let mut store = dst.write();
        let root = store.root_id();
        store.add_child(root, "other", names::NT_UNSTRUCTURED).unwrap();
    }
    let summary = dst.import("/", first.clone().into_iter().map(Ok), &ImportOptions::default()).unwrap();
    assert_eq!(summary.references_resolved, 3);
    assert_eq!(summary.references_unresolved, 0);

    assert_eq!(export(&dst, "/a"), first);
}

// ============================================================================
// 2. Relocation: references inside the subtree follow it
// ============================================================================

#[test]
fn test_roundtrip_relocated() {
    let src = seeded();
    let first = export(&src, "/a");

    let dst = Repository::open_memory();
    {
        let mut store = dst.write();
        let root = store.root_id();
        let x = store.add_child(root, "x", names::NT_UNSTRUCTURED).unwrap();
        store.add_child(x, "y", names::NT_UNSTRUCTURED).unwrap();
        store.add_child(root, "other", names::NT_UNSTRUCTURED).unwrap();
    }
    dst.import("/x/y", first.clone().into_iter().map(Ok), &ImportOptions::default()).unwrap();

    assert_eq!(export(&dst, "/x/y/a"), first);

    let store = dst.read();
    let a = store.node_by_path("/x/y/a").unwrap().unwrap();
    let d = store.node_by_path("/x/y/a/b/d").unwrap().unwrap();
    assert_eq!(store.property(d, "up").unwrap(), Some(Property::reference("up", a)));
}

// ============================================================================
// 3. JSON lines round trip
// ============================================================================

#[test]
fn test_roundtrip_json_lines() {
    let src = seeded();
    let mut bytes = Vec::new();
    src.export_to("/a", &ExportOptions::default(), &mut bytes).unwrap();

    let dst = Repository::open_memory();
    {
        let mut store = dst.write();
        let root = store.root_id();
        store.add_child(root, "other", names::NT_UNSTRUCTURED).unwrap();
    }
    dst.import_from("/", bytes.as_slice(), &ImportOptions::default()).unwrap();

    let mut again = Vec::new();
    dst.export_to("/a", &ExportOptions::default(), &mut again).unwrap();
    assert_eq!(String::from_utf8(again).unwrap(), String::from_utf8(bytes).unwrap());
}

// ============================================================================
// 4. Whole-repository export merges into the import target
// ============================================================================

#[test]
fn test_roundtrip_repository_root() {
    let src = seeded();
    {
        let mut store = src.write();
        let root = store.root_id();
        store.set_property(root, Property::single("site", "main")).unwrap();
    }
    let first = export(&src, "/");
    assert!(matches!(&first[0], SerializedEvent::NodeStart { type_name, .. } if type_name == names::REP_ROOT));

    let dst = Repository::open_memory();
    let summary = dst.import("/", first.clone().into_iter().map(Ok), &ImportOptions::default()).unwrap();
    assert_eq!(summary.nodes_retained, 1);
    assert_eq!(summary.nodes_created, 5);
    assert_eq!(summary.references_resolved, 3);
    assert_eq!(summary.references_unresolved, 0);

    assert_eq!(export(&dst, "/"), first);

    let other = Repository::open_memory();
    {
        let mut store = other.write();
        let root = store.root_id();
        store.add_child(root, "mirror", names::NT_UNSTRUCTURED).unwrap();
    }
    other.import("/mirror", first.into_iter().map(Ok), &ImportOptions::default()).unwrap();

    let store = other.read();
    let mirror = store.node_by_path("/mirror").unwrap().unwrap();
    let a = store.node_by_path("/mirror/a").unwrap().unwrap();
    let c = store.node_by_path("/mirror/a/c").unwrap().unwrap();
    let mirrored_other = store.node_by_path("/mirror/other").unwrap().unwrap();
    assert_eq!(store.property(mirror, "site").unwrap(), Some(Property::single("site", "main")));
    assert_eq!(store.property(c, "ext").unwrap(), Some(Property::reference("ext", mirrored_other)));
    let d = store.node_by_path("/mirror/a/b/d").unwrap().unwrap();
    assert_eq!(store.property(d, "up").unwrap(), Some(Property::reference("up", a)));
}

// ============================================================================
// 5. Property-based: arbitrary trees with arbitrary internal references
// ============================================================================

/// Build /t from (parent choice, name, reference target choice) triples.
fn build(shape: &[(prop::sample::Index, String, prop::sample::Index)]) -> (Repository<MemoryStore>, usize) {
    let repo = Repository::open_memory();
    {
        let mut store = repo.write();
        let root = store.root_id();
        let t = store.add_child(root, "t", names::NT_UNSTRUCTURED).unwrap();
        let mut ids: Vec<NodeId> = vec![t];
        for (parent, name, _) in shape {
            let parent = ids[parent.index(ids.len())];
            let id = store.add_child(parent, name, names::NT_UNSTRUCTURED).unwrap();
            ids.push(id);
        }
        for (i, (_, _, target)) in shape.iter().enumerate() {
            let holder = ids[i + 1];
            store.set_property(holder, Property::single("n", i as i64)).unwrap();
            store.set_property(holder, Property::reference("ref", ids[target.index(ids.len())])).unwrap();
        }
    }
    (repo, shape.len())
}

proptest! {
    #[test]
    fn prop_roundtrip_reproduces_stream(
        shape in prop::collection::vec(
            (any::<prop::sample::Index>(), "[a-c]", any::<prop::sample::Index>()),
            0..16,
        )
    ) {
        let (src, references) = build(&shape);
        let first = export(&src, "/t");

        let dst = Repository::open_memory();
        let summary = dst.import("/", first.clone().into_iter().map(Ok), &ImportOptions::default()).unwrap();
        prop_assert_eq!(summary.nodes_created as usize, references + 1);
        prop_assert_eq!(summary.references_resolved as usize, references);
        prop_assert_eq!(summary.references_unresolved, 0);

        prop_assert_eq!(export(&dst, "/t"), first);
    }
}
