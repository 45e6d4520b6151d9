//! Integration tests for saving and loading complete asset graphs
//!
//! These tests run the serializer over the fixture scene from
//! `record_test_utils` through the public `galaxy3d` namespace only.
//!
//! Run with: cargo test --test serializer_integration_tests

mod record_test_utils;

use std::sync::Arc;
use std::thread;
use glam::{Mat4, Vec3, Vec4};
use galaxy_3d_serializer::galaxy3d::Error;
use galaxy_3d_serializer::galaxy3d::record::{RecordRef, new_record, downgrade};
use galaxy_3d_serializer::galaxy3d::serializer::{Serializer, is_package, peek_root};
use record_test_utils::*;

// ============================================================================
// ROUND TRIP TESTS
// ============================================================================

#[test]
fn test_integration_character_round_trip() {
    let registry = fixture_registry();
    let scene = character_scene();
    let mut serializer = Serializer::new(&registry);

    let bytes = serializer.save(&scene).unwrap();
    let loaded = serializer.load(&bytes).unwrap();
    let root = &loaded.root;

    // Step 1: root node and children
    let children = with(root, |n: &SceneNode| {
        assert_eq!(n.name, "root");
        assert_eq!(n.transform, Mat4::IDENTITY);
        assert!(n.parent.is_none());
        n.children.clone()
    });
    assert_eq!(children.len(), 4);

    // Step 2: body mesh and its polymorphic material
    let mesh = with(&children[0], |n: &SceneNode| {
        assert_eq!(n.name, "body");
        assert_eq!(n.transform, Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)));
        let parent = n.parent.as_ref().unwrap().upgrade().unwrap();
        assert!(Arc::ptr_eq(&parent, root));
        n.mesh.clone().unwrap()
    });
    let material = with(&mesh, |m: &Mesh| {
        assert_eq!(m.vertices, triangle());
        assert_eq!(m.indices, vec![0, 1, 2]);
        m.material.clone().unwrap()
    });
    with(&material, |m: &PbrMaterial| {
        assert_eq!(m.base_color, Vec4::new(0.8, 0.2, 0.1, 1.0));
        assert_eq!(m.roughness, 0.6);
    });

    // Step 3: skin references the skeleton's bones
    let bones = with(&children[1], |s: &Skeleton| s.bones.clone());
    assert_eq!(bones.len(), 2);
    with(&children[2], |s: &Skin| {
        let targets: Vec<RecordRef> = s.bones.iter().map(|b| b.upgrade().unwrap()).collect();
        assert!(Arc::ptr_eq(&targets[0], &bones[0]));
        assert!(Arc::ptr_eq(&targets[1], &bones[1]));
        assert_eq!(s.inverse_bind[1], Mat4::from_scale(Vec3::splat(2.0)));
    });

    // Step 4: clip curves (embedded) reference the same bones
    with(&children[3], |c: &AnimationClip| {
        assert_eq!(c.name, "walk");
        assert_eq!(c.duration, 1.25);
        assert_eq!(c.loads, 1);
        assert_eq!(c.curves.len(), 2);
        let hip = c.curves[0].target.as_ref().unwrap().upgrade().unwrap();
        assert!(Arc::ptr_eq(&hip, &bones[0]));
        assert_eq!(c.curves[0].keys, vec![Vec3::ZERO, Vec3::X]);
        assert_eq!(c.curves[1].keys, vec![Vec3::Y]);
    });
}

#[test]
fn test_integration_resave_is_byte_identical() {
    let registry = fixture_registry();
    let mut serializer = Serializer::new(&registry);

    let bytes = serializer.save(&character_scene()).unwrap();
    let loaded = serializer.load(&bytes).unwrap();
    let again = serializer.save(&loaded.root).unwrap();

    assert_eq!(bytes, again);
}

#[test]
fn test_integration_identity_table() {
    let registry = fixture_registry();
    let bytes = Serializer::new(&registry).save(&character_scene()).unwrap();
    let loaded = Serializer::new(&registry).load(&bytes).unwrap();
    let table = &loaded.identities;

    assert_eq!(table.len(), 9);
    let counts = table.count_by_type();
    assert_eq!(counts.get(&SCENE_NODE), Some(&4));
    assert_eq!(counts.get(&PBR_MATERIAL), Some(&1));
    assert_eq!(counts.get(&MATERIAL), None);

    // Pre-order: body, its mesh and material come before the skeleton
    let tags: Vec<_> = table.iter().map(|(_, entry)| entry.type_tag).collect();
    assert_eq!(
        tags,
        vec![SCENE_NODE, SCENE_NODE, MESH, PBR_MATERIAL, SKELETON, SCENE_NODE, SCENE_NODE, SKIN, ANIMATION_CLIP]
    );

    // Each subtree lies within its parent's byte range
    let root = table.get(0).unwrap();
    assert_eq!(root.offset, 4);
    assert_eq!(root.size, bytes.len() - 4);
    for (_, entry) in table.iter() {
        assert!(entry.offset >= root.offset);
        assert!(entry.offset + entry.size <= root.offset + root.size);
    }
    assert_eq!(table.get(8).unwrap().version, 1);
}

#[test]
fn test_integration_measure_and_inspect() {
    let registry = fixture_registry();
    let scene = character_scene();
    let mut serializer = Serializer::new(&registry);

    let size = serializer.measure(&scene).unwrap();
    let bytes = serializer.save(&scene).unwrap();
    assert_eq!(size, bytes.len());

    assert!(is_package(&bytes));
    assert!(!is_package(&bytes[1..]));
    assert!(!is_package(&[]));

    let header = peek_root(&bytes).unwrap();
    assert_eq!(header.type_tag, SCENE_NODE);
    assert_eq!(header.size as usize, bytes.len() - 4);
}

// ============================================================================
// ERROR TESTS
// ============================================================================

#[test]
fn test_integration_skin_bone_outside_graph() {
    let registry = fixture_registry();
    let scene = character_scene();
    let stray = new_record(node("stray", Mat4::IDENTITY));

    let skin = with(&scene, |n: &SceneNode| n.children[2].clone());
    skin.lock().unwrap().downcast_mut::<Skin>().unwrap().bones.push(downgrade(&stray));

    let result = Serializer::new(&registry).save(&scene);
    assert_eq!(result, Err(Error::DanglingReference { referrer: 7 }));
}

#[test]
fn test_integration_mesh_without_material_kind() {
    let registry = fixture_registry();
    let mesh = new_record(Mesh {
        vertices: triangle(),
        indices: Vec::new(),
        material: Some(new_record(node("not a material", Mat4::IDENTITY))),
    });

    let result = Serializer::new(&registry).save(&mesh);
    assert_eq!(result, Err(Error::TypeMismatch { expected: MATERIAL, found: SCENE_NODE }));
}

#[test]
fn test_integration_every_truncation_fails() {
    let registry = fixture_registry();
    let bytes = Serializer::new(&registry).save(&character_scene()).unwrap();

    for len in 0..bytes.len() {
        let result = Serializer::new(&registry).load(&bytes[..len]);
        assert!(result.is_err(), "prefix of {} bytes should not load", len);
    }
}

#[test]
fn test_integration_unregistered_subtype_on_load() {
    let registry = fixture_registry();
    let bytes = Serializer::new(&registry).save(&character_scene()).unwrap();

    let mut partial = galaxy_3d_serializer::galaxy3d::registry::TypeRegistry::new();
    partial.register_type::<SceneNode>(SCENE_NODE, "SceneNode").unwrap();
    partial.register_type::<Mesh>(MESH, "Mesh").unwrap();
    partial.register_type::<Material>(MATERIAL, "Material").unwrap();

    let result = Serializer::new(&partial).load(&bytes);
    assert!(matches!(result, Err(Error::UnknownType(tag)) if tag == PBR_MATERIAL));
}

// ============================================================================
// CONCURRENCY TESTS
// ============================================================================

#[test]
fn test_integration_parallel_saves_share_registry() {
    let registry = Arc::new(fixture_registry());

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let scene = character_scene();
                let bytes = Serializer::new(&registry).save(&scene).unwrap();
                let loaded = Serializer::new(&registry).load(&bytes).unwrap();
                (bytes, loaded.identities.len())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0].0, results[1].0);
    assert_eq!(results[0].1, 9);
}

#[test]
fn test_integration_loaded_graph_moves_across_threads() {
    let registry = fixture_registry();
    let bytes = Serializer::new(&registry).save(&character_scene()).unwrap();
    let loaded = Serializer::new(&registry).load(&bytes).unwrap();

    let root = loaded.root.clone();
    let name = thread::spawn(move || with(&root, |n: &SceneNode| n.name.clone()))
        .join()
        .unwrap();
    assert_eq!(name, "root");
}
