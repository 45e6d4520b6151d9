#![allow(dead_code)]
//! Record fixtures shared by the integration tests
//!
//! A small asset graph in the shape the engine exports: scene nodes owning
//! meshes and child nodes, polymorphic materials, a skeleton whose bones are
//! referenced by a skin, and an animation clip whose inline curves point at
//! those bones.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use galaxy_3d_serializer::galaxy3d::Result;
use galaxy_3d_serializer::galaxy3d::record::{Record, RecordRef, RecordWeak, new_record, downgrade};
use galaxy_3d_serializer::galaxy3d::registry::{TypeRegistry, TypeTag};
use galaxy_3d_serializer::galaxy3d::serializer::Serializer;

// ============================================================================
// TYPE TAGS
// ============================================================================

pub const SCENE_NODE: TypeTag = TypeTag(0x100);
pub const MESH: TypeTag = TypeTag(0x200);
pub const MATERIAL: TypeTag = TypeTag(0x300);
pub const PBR_MATERIAL: TypeTag = TypeTag(0x301);
pub const SKELETON: TypeTag = TypeTag(0x400);
pub const SKIN: TypeTag = TypeTag(0x401);
pub const ANIMATION_CLIP: TypeTag = TypeTag(0x500);
pub const CURVE: TypeTag = TypeTag(0x501);

// ============================================================================
// RECORDS
// ============================================================================

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Default)]
pub struct SceneNode {
    pub name: String,
    pub transform: Mat4,
    pub children: Vec<RecordRef>,
    pub mesh: Option<RecordRef>,
    pub parent: Option<RecordWeak>,
}

impl Record for SceneNode {
    fn type_tag(&self) -> TypeTag {
        SCENE_NODE
    }

    fn describe_fields(&mut self, s: &mut Serializer<'_>) -> Result<()> {
        s.string(&mut self.name)?;
        s.data(&mut self.transform)?;
        s.owned_pointer_array(&mut self.children)?;
        s.owned_pointer_of_kind(&mut self.mesh, MESH)?;
        s.reference(&mut self.parent)
    }
}

#[derive(Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Option<RecordRef>,
}

impl Record for Mesh {
    fn type_tag(&self) -> TypeTag {
        MESH
    }

    fn describe_fields(&mut self, s: &mut Serializer<'_>) -> Result<()> {
        s.dynamic_array(&mut self.vertices)?;
        s.dynamic_array(&mut self.indices)?;
        s.owned_pointer_of_kind(&mut self.material, MATERIAL)
    }
}

#[derive(Default)]
pub struct Material {
    pub base_color: Vec4,
}

impl Record for Material {
    fn type_tag(&self) -> TypeTag {
        MATERIAL
    }

    fn describe_fields(&mut self, s: &mut Serializer<'_>) -> Result<()> {
        s.data(&mut self.base_color)
    }
}

#[derive(Default)]
pub struct PbrMaterial {
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
}

impl Record for PbrMaterial {
    fn type_tag(&self) -> TypeTag {
        PBR_MATERIAL
    }

    fn describe_fields(&mut self, s: &mut Serializer<'_>) -> Result<()> {
        s.data(&mut self.base_color)?;
        s.data(&mut self.metallic)?;
        s.data(&mut self.roughness)
    }
}

#[derive(Default)]
pub struct Skeleton {
    pub bones: Vec<RecordRef>,
}

impl Record for Skeleton {
    fn type_tag(&self) -> TypeTag {
        SKELETON
    }

    fn describe_fields(&mut self, s: &mut Serializer<'_>) -> Result<()> {
        s.owned_pointer_array(&mut self.bones)
    }
}

#[derive(Default)]
pub struct Skin {
    pub bones: Vec<RecordWeak>,
    pub inverse_bind: Vec<Mat4>,
}

impl Record for Skin {
    fn type_tag(&self) -> TypeTag {
        SKIN
    }

    fn describe_fields(&mut self, s: &mut Serializer<'_>) -> Result<()> {
        s.reference_array(&mut self.bones)?;
        s.dynamic_array(&mut self.inverse_bind)
    }
}

/// Inline keyframe curve of a clip
#[derive(Default)]
pub struct Curve {
    pub target: Option<RecordWeak>,
    pub keys: Vec<Vec3>,
}

impl Record for Curve {
    fn type_tag(&self) -> TypeTag {
        CURVE
    }

    fn describe_fields(&mut self, s: &mut Serializer<'_>) -> Result<()> {
        s.reference(&mut self.target)?;
        s.dynamic_array(&mut self.keys)
    }
}

#[derive(Default)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub curves: Vec<Curve>,
    /// Bumped by `after_load`
    pub loads: u32,
}

impl Record for AnimationClip {
    fn type_tag(&self) -> TypeTag {
        ANIMATION_CLIP
    }

    fn version(&self) -> u32 {
        1
    }

    fn describe_fields(&mut self, s: &mut Serializer<'_>) -> Result<()> {
        s.string(&mut self.name)?;
        if s.record_version() >= 1 {
            s.data(&mut self.duration)?;
        }
        s.embedded_array(&mut self.curves)
    }

    fn after_load(&mut self) {
        self.loads += 1;
    }
}

// ============================================================================
// REGISTRY AND GRAPHS
// ============================================================================

/// Registry holding every fixture type
pub fn fixture_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_type::<SceneNode>(SCENE_NODE, "SceneNode").unwrap();
    registry.register_type::<Mesh>(MESH, "Mesh").unwrap();
    registry.register_type::<Material>(MATERIAL, "Material").unwrap();
    registry.register_subtype::<PbrMaterial>(PBR_MATERIAL, "PbrMaterial", MATERIAL).unwrap();
    registry.register_type::<Skeleton>(SKELETON, "Skeleton").unwrap();
    registry.register_type::<Skin>(SKIN, "Skin").unwrap();
    registry.register_type::<AnimationClip>(ANIMATION_CLIP, "AnimationClip").unwrap();
    registry.register_type::<Curve>(CURVE, "Curve").unwrap();
    registry
}

pub fn triangle() -> Vec<Vertex> {
    vec![
        Vertex { position: [0.0, 0.0, 0.0], normal: [0.0, 0.0, 1.0], uv: [0.0, 0.0] },
        Vertex { position: [1.0, 0.0, 0.0], normal: [0.0, 0.0, 1.0], uv: [1.0, 0.0] },
        Vertex { position: [0.0, 1.0, 0.0], normal: [0.0, 0.0, 1.0], uv: [0.0, 1.0] },
    ]
}

pub fn node(name: &str, transform: Mat4) -> SceneNode {
    SceneNode {
        name: name.to_string(),
        transform,
        ..SceneNode::default()
    }
}

/// Lock a record and borrow it as its concrete type
pub fn with<T: Record, R>(record: &RecordRef, f: impl FnOnce(&T) -> R) -> R {
    let guard = record.lock().unwrap();
    f(guard.downcast_ref::<T>().expect("unexpected record type"))
}

/// Root node owning a skinned character and its animation clip
///
/// ```text
/// root
/// ├── body (mesh → PbrMaterial)
/// ├── skeleton [hip, knee]
/// ├── skin → hip, knee
/// └── clip (curves → hip, knee)
/// ```
///
/// Every child node references `root` as its parent.
pub fn character_scene() -> RecordRef {
    let root = new_record(node("root", Mat4::IDENTITY));
    let parent = downgrade(&root);

    let material = new_record(PbrMaterial {
        base_color: Vec4::new(0.8, 0.2, 0.1, 1.0),
        metallic: 0.0,
        roughness: 0.6,
    });
    let mesh = new_record(Mesh {
        vertices: triangle(),
        indices: vec![0, 1, 2],
        material: Some(material),
    });
    let mut body = node("body", Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)));
    body.mesh = Some(mesh);
    body.parent = Some(parent.clone());
    let body = new_record(body);

    let mut hip = node("hip", Mat4::from_translation(Vec3::new(0.0, 0.9, 0.0)));
    hip.parent = Some(parent.clone());
    let hip = new_record(hip);
    let mut knee = node("knee", Mat4::from_translation(Vec3::new(0.0, 0.5, 0.1)));
    knee.parent = Some(parent.clone());
    let knee = new_record(knee);

    let skin = new_record(Skin {
        bones: vec![downgrade(&hip), downgrade(&knee)],
        inverse_bind: vec![Mat4::IDENTITY, Mat4::from_scale(Vec3::splat(2.0))],
    });
    let clip = new_record(AnimationClip {
        name: "walk".to_string(),
        duration: 1.25,
        curves: vec![
            Curve { target: Some(downgrade(&hip)), keys: vec![Vec3::ZERO, Vec3::X] },
            Curve { target: Some(downgrade(&knee)), keys: vec![Vec3::Y] },
        ],
        loads: 0,
    });
    let skeleton = new_record(Skeleton { bones: vec![hip, knee] });

    {
        let mut guard = root.lock().unwrap();
        let scene = guard.downcast_mut::<SceneNode>().unwrap();
        scene.children = vec![body, skeleton, skin, clip];
    }
    root
}
