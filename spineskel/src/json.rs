//! Typed view of a Spine 3.8 JSON skeleton export.
//!
//! The document is deserialized once up front; the binary writer walks the
//! typed tree. Name-keyed objects whose order defines wire indices (skins,
//! events, animations, per-entity timeline maps) go through [`Entries`],
//! which keeps document order — the decoder rebuilds every name table from
//! emission order, so sorting those keys would silently re-index the
//! skeleton.

use crate::Error;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::marker::PhantomData;

/// JSON object entries in document order.
#[derive(Debug)]
pub(crate) struct Entries<T>(pub(crate) Vec<(String, T)>);

impl<T> Default for Entries<T> {
    fn default() -> Self {
        Entries(Vec::new())
    }
}

impl<T> Entries<T> {
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &(String, T)> {
        self.0.iter()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Entries<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
            type Value = Entries<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

pub(crate) fn parse(input: &[u8]) -> Result<Root, Error> {
    serde_json::from_slice(input).map_err(|e| Error::JsonParse {
        message: e.to_string(),
    })
}

fn default_one() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_region_size() -> f32 {
    32.0
}

#[derive(Debug, Deserialize)]
pub(crate) struct Root {
    pub(crate) skeleton: Option<SkeletonHeader>,
    pub(crate) bones: Option<Vec<BoneDef>>,
    pub(crate) slots: Option<Vec<SlotDef>>,
    pub(crate) ik: Option<Vec<IkConstraintDef>>,
    pub(crate) transform: Option<Vec<TransformConstraintDef>>,
    pub(crate) path: Option<Vec<PathConstraintDef>>,
    pub(crate) skins: Option<SkinsDef>,
    pub(crate) events: Option<Entries<EventDef>>,
    pub(crate) animations: Option<Entries<AnimationDef>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SkeletonHeader {
    pub(crate) hash: Option<String>,
    pub(crate) spine: Option<String>,
    #[serde(default)]
    pub(crate) width: f32,
    #[serde(default)]
    pub(crate) height: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoneDef {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) parent: Option<String>,
    #[serde(default)]
    pub(crate) rotation: f32,
    #[serde(default)]
    pub(crate) x: f32,
    #[serde(default)]
    pub(crate) y: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    pub(crate) scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    pub(crate) scale_y: f32,
    #[serde(default, rename = "shearX")]
    pub(crate) shear_x: f32,
    #[serde(default, rename = "shearY")]
    pub(crate) shear_y: f32,
    #[serde(default)]
    pub(crate) length: f32,
    #[serde(default)]
    pub(crate) transform: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlotDef {
    pub(crate) name: String,
    pub(crate) bone: String,
    #[serde(default)]
    pub(crate) color: Option<String>,
    #[serde(default)]
    pub(crate) dark: Option<String>,
    #[serde(default)]
    pub(crate) attachment: Option<String>,
    #[serde(default)]
    pub(crate) blend: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IkConstraintDef {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) order: i32,
    #[serde(default)]
    pub(crate) bones: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) target: Option<String>,
    #[serde(default = "default_one")]
    pub(crate) mix: f32,
    #[serde(default = "default_true", rename = "bendPositive")]
    pub(crate) bend_positive: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransformConstraintDef {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) order: i32,
    #[serde(default)]
    pub(crate) bones: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) target: Option<String>,
    #[serde(default)]
    pub(crate) local: bool,
    #[serde(default)]
    pub(crate) relative: bool,
    #[serde(default)]
    pub(crate) rotation: f32,
    #[serde(default)]
    pub(crate) x: f32,
    #[serde(default)]
    pub(crate) y: f32,
    #[serde(default, rename = "scaleX")]
    pub(crate) scale_x: f32,
    #[serde(default, rename = "scaleY")]
    pub(crate) scale_y: f32,
    #[serde(default, rename = "shearY")]
    pub(crate) shear_y: f32,
    #[serde(default = "default_one", rename = "rotateMix")]
    pub(crate) rotate_mix: f32,
    #[serde(default = "default_one", rename = "translateMix")]
    pub(crate) translate_mix: f32,
    #[serde(default = "default_one", rename = "scaleMix")]
    pub(crate) scale_mix: f32,
    #[serde(default = "default_one", rename = "shearMix")]
    pub(crate) shear_mix: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PathConstraintDef {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) order: i32,
    #[serde(default)]
    pub(crate) bones: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) target: Option<String>,
    #[serde(default, rename = "positionMode")]
    pub(crate) position_mode: Option<String>,
    #[serde(default, rename = "spacingMode")]
    pub(crate) spacing_mode: Option<String>,
    #[serde(default, rename = "rotateMode")]
    pub(crate) rotate_mode: Option<String>,
    #[serde(default)]
    pub(crate) rotation: f32,
    #[serde(default)]
    pub(crate) position: f32,
    #[serde(default)]
    pub(crate) spacing: f32,
    #[serde(default = "default_one", rename = "rotateMix")]
    pub(crate) rotate_mix: f32,
    #[serde(default = "default_one", rename = "translateMix")]
    pub(crate) translate_mix: f32,
}

/// Per-skin attachment bindings: slot name → placeholder name → attachment.
pub(crate) type SkinSlots = Entries<Entries<AttachmentDef>>;

/// Spine 3.8 exported skins as an object keyed by skin name; 3.8.95+ exports
/// an array of `{name, attachments}` objects instead. Both are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SkinsDef {
    Map(Entries<SkinSlots>),
    Array(Vec<NamedSkinDef>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct NamedSkinDef {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) attachments: SkinSlots,
}

impl SkinsDef {
    pub(crate) fn into_entries(self) -> Vec<(String, SkinSlots)> {
        match self {
            SkinsDef::Map(entries) => entries.0,
            SkinsDef::Array(skins) => skins
                .into_iter()
                .map(|skin| (skin.name, skin.attachments))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttachmentDef {
    #[serde(default, rename = "type")]
    pub(crate) attachment_type: Option<String>,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) path: Option<String>,
    #[serde(default)]
    pub(crate) rotation: f32,
    #[serde(default)]
    pub(crate) x: f32,
    #[serde(default)]
    pub(crate) y: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    pub(crate) scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    pub(crate) scale_y: f32,
    #[serde(default = "default_region_size")]
    pub(crate) width: f32,
    #[serde(default = "default_region_size")]
    pub(crate) height: f32,
    #[serde(default)]
    pub(crate) color: Option<String>,
    #[serde(default)]
    pub(crate) uvs: Option<Vec<f32>>,
    #[serde(default)]
    pub(crate) triangles: Option<Vec<u32>>,
    #[serde(default)]
    pub(crate) vertices: Option<Vec<f32>>,
    #[serde(default)]
    pub(crate) hull: u32,
    #[serde(default)]
    pub(crate) skin: Option<String>,
    #[serde(default)]
    pub(crate) parent: Option<String>,
    #[serde(default = "default_true")]
    pub(crate) deform: bool,
    #[serde(default)]
    pub(crate) closed: bool,
    #[serde(default, rename = "constantSpeed")]
    pub(crate) constant_speed: bool,
    #[serde(default, rename = "vertexCount")]
    pub(crate) vertex_count: u32,
    #[serde(default)]
    pub(crate) lengths: Option<Vec<f32>>,
    #[serde(default)]
    pub(crate) end: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct EventDef {
    #[serde(default, rename = "int")]
    pub(crate) int_value: i32,
    #[serde(default, rename = "float")]
    pub(crate) float_value: f32,
    #[serde(default, rename = "string")]
    pub(crate) string_value: Option<String>,
}

/// One animation. Slot, bone and path timelines stay as raw JSON values so
/// the writer can dispatch on the timeline *name* (an unknown name is fatal,
/// and the per-entity timeline count includes every entry).
#[derive(Debug, Deserialize, Default)]
pub(crate) struct AnimationDef {
    #[serde(default)]
    pub(crate) slots: Entries<Entries<serde_json::Value>>,
    #[serde(default)]
    pub(crate) bones: Entries<Entries<serde_json::Value>>,
    #[serde(default)]
    pub(crate) ik: Entries<Vec<IkKey>>,
    #[serde(default)]
    pub(crate) transform: Entries<Vec<TransformKey>>,
    #[serde(default)]
    pub(crate) paths: Entries<Entries<serde_json::Value>>,
    #[serde(default)]
    pub(crate) deform: Entries<Entries<Entries<Vec<DeformKey>>>>,
    #[serde(default, rename = "drawOrder")]
    pub(crate) draw_order: Vec<DrawOrderKey>,
    #[serde(default)]
    pub(crate) events: Vec<EventKey>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttachmentKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default)]
    pub(crate) name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ColorKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default)]
    pub(crate) color: Option<String>,
    #[serde(default)]
    pub(crate) curve: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TwoColorKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default)]
    pub(crate) light: Option<String>,
    #[serde(default)]
    pub(crate) dark: Option<String>,
    #[serde(default)]
    pub(crate) curve: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RotateKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default)]
    pub(crate) angle: f32,
    #[serde(default)]
    pub(crate) curve: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Vec2Key {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default)]
    pub(crate) x: f32,
    #[serde(default)]
    pub(crate) y: f32,
    #[serde(default)]
    pub(crate) curve: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IkKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default = "default_one")]
    pub(crate) mix: f32,
    #[serde(default = "default_true", rename = "bendPositive")]
    pub(crate) bend_positive: bool,
    #[serde(default)]
    pub(crate) curve: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransformKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default = "default_one", rename = "rotateMix")]
    pub(crate) rotate_mix: f32,
    #[serde(default = "default_one", rename = "translateMix")]
    pub(crate) translate_mix: f32,
    #[serde(default = "default_one", rename = "scaleMix")]
    pub(crate) scale_mix: f32,
    #[serde(default = "default_one", rename = "shearMix")]
    pub(crate) shear_mix: f32,
    #[serde(default)]
    pub(crate) curve: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PathValueKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default)]
    pub(crate) position: f32,
    #[serde(default)]
    pub(crate) spacing: f32,
    #[serde(default)]
    pub(crate) curve: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PathMixKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default = "default_one", rename = "rotateMix")]
    pub(crate) rotate_mix: f32,
    #[serde(default = "default_one", rename = "translateMix")]
    pub(crate) translate_mix: f32,
    #[serde(default)]
    pub(crate) curve: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeformKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default)]
    pub(crate) offset: u32,
    #[serde(default)]
    pub(crate) vertices: Option<Vec<f32>>,
    #[serde(default)]
    pub(crate) curve: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DrawOrderKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default)]
    pub(crate) offsets: Vec<DrawOrderOffsetDef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DrawOrderOffsetDef {
    #[serde(default)]
    pub(crate) slot: Option<String>,
    #[serde(default)]
    pub(crate) offset: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventKey {
    #[serde(default)]
    pub(crate) time: f32,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default, rename = "int")]
    pub(crate) int_value: Option<i32>,
    #[serde(default, rename = "float")]
    pub(crate) float_value: Option<f32>,
    #[serde(default, rename = "string")]
    pub(crate) string_value: Option<String>,
}
