//! Spine `.skel` (binary) writer for Spine 3.8 exports.
//!
//! The writer is IO-free: it appends to a caller-supplied byte buffer. One
//! call converts one skeleton; every stage both emits bytes and publishes an
//! ordered name table that later stages resolve references against. The
//! decoder rebuilds the same tables from emission order, so emission order
//! *is* the index space.

use crate::json::{
    self, AnimationDef, AttachmentDef, AttachmentKey, BoneDef, ColorKey, DeformKey, EventDef,
    IkConstraintDef, PathConstraintDef, PathMixKey, PathValueKey, Root, RotateKey, SkeletonHeader,
    SkinSlots, SlotDef, TransformConstraintDef, TwoColorKey, Vec2Key,
};
use crate::{AtlasIndex, Error};
use byteorder::{BigEndian, ByteOrder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

const CURVE_LINEAR: u8 = 0;
const CURVE_STEPPED: u8 = 1;
const CURVE_BEZIER: u8 = 2;

const ATTACHMENT_REGION: u8 = 0;
const ATTACHMENT_BOUNDING_BOX: u8 = 1;
const ATTACHMENT_MESH: u8 = 2;
const ATTACHMENT_LINKED_MESH: u8 = 3;
const ATTACHMENT_PATH: u8 = 4;
const ATTACHMENT_POINT: u8 = 5;
const ATTACHMENT_CLIPPING: u8 = 6;

const BLEND_NORMAL: i32 = 0;
const BLEND_ADDITIVE: i32 = 1;
const BLEND_MULTIPLY: i32 = 2;
const BLEND_SCREEN: i32 = 3;

const SLOT_ATTACHMENT: u8 = 0;
const SLOT_COLOR: u8 = 1;
const SLOT_TWO_COLOR: u8 = 2;

const BONE_ROTATE: u8 = 0;
const BONE_TRANSLATE: u8 = 1;
const BONE_SCALE: u8 = 2;
const BONE_SHEAR: u8 = 3;

const PATH_POSITION: u8 = 0;
const PATH_SPACING: u8 = 1;
const PATH_MIX: u8 = 2;

const POSITION_FIXED: i32 = 0;
const POSITION_PERCENT: i32 = 1;

const SPACING_LENGTH: i32 = 0;
const SPACING_FIXED: i32 = 1;
const SPACING_PERCENT: i32 = 2;

const ROTATE_TANGENT: i32 = 0;
const ROTATE_CHAIN: i32 = 1;
const ROTATE_CHAIN_SCALE: i32 = 2;

/// Append-only writer over a caller-supplied buffer.
///
/// Mirrors the packing the runtimes read back: big-endian floats, base-128
/// varints with optional zig-zag pre-encoding, length-prefix-plus-one
/// strings, packed RGBA8 colors.
#[derive(Debug)]
pub(crate) struct BinaryOutput<'a> {
    out: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> BinaryOutput<'a> {
    pub(crate) fn new(out: &'a mut Vec<u8>) -> Self {
        let start = out.len();
        Self { out, start }
    }

    /// Bytes appended since construction.
    pub(crate) fn position(&self) -> usize {
        self.out.len() - self.start
    }

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.out.push(value);
    }

    pub(crate) fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub(crate) fn write_f32_be(&mut self, value: f32) {
        let mut buf = [0u8; 4];
        BigEndian::write_f32(&mut buf, value);
        self.out.extend_from_slice(&buf);
    }

    pub(crate) fn write_u16_be(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, value);
        self.out.extend_from_slice(&buf);
    }

    /// Base-128 varint, low bits first, at most 5 bytes. With
    /// `optimize_positive = false` the value is zig-zag pre-encoded so small
    /// negatives stay small on the wire.
    pub(crate) fn write_varint(&mut self, value: i32, optimize_positive: bool) {
        let mut v = if optimize_positive {
            value as u32
        } else {
            ((value as u32) << 1) ^ ((value >> 31) as u32)
        };
        loop {
            let b = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                self.write_u8(b);
                return;
            }
            self.write_u8(b | 0x80);
        }
    }

    /// Length-prefix-plus-one string: 0 is absent, 1 is empty, n+1 is n raw
    /// UTF-8 bytes (no terminator).
    pub(crate) fn write_string(&mut self, value: Option<&str>) {
        match value {
            None => self.write_varint(0, true),
            Some(s) => {
                self.write_varint(s.len() as i32 + 1, true);
                self.out.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// Packed RGBA8 from an `rrggbbaa` hex string; absent is opaque white.
    /// A missing or malformed pair falls back to 0xFF, so six-digit colors
    /// (dark tints without alpha) come out opaque.
    pub(crate) fn write_color(&mut self, color: Option<&str>) {
        fn hex(b: u8) -> Option<u8> {
            match b {
                b'0'..=b'9' => Some(b - b'0'),
                b'a'..=b'f' => Some(b - b'a' + 10),
                b'A'..=b'F' => Some(b - b'A' + 10),
                _ => None,
            }
        }

        let bytes = color.map(str::as_bytes).unwrap_or(&[]);
        for channel in 0..4 {
            let value = bytes
                .get(channel * 2)
                .copied()
                .and_then(hex)
                .zip(bytes.get(channel * 2 + 1).copied().and_then(hex))
                .map(|(hi, lo)| (hi << 4) | lo)
                .unwrap_or(0xFF);
            self.write_u8(value);
        }
    }
}

#[derive(Clone, Debug)]
struct BoneEntry {
    name: String,
    parent: usize,
    rotation: f32,
    x: f32,
    y: f32,
    scale_x: f32,
    scale_y: f32,
    shear_x: f32,
    shear_y: f32,
    length: f32,
    mode: i32,
}

#[derive(Clone, Debug)]
struct EventEntry {
    name: String,
    int_value: i32,
    float_value: f32,
}

fn transform_mode(raw: Option<&str>) -> i32 {
    match raw.unwrap_or("normal") {
        "onlyTranslation" => 1,
        "noRotationOrReflection" => 2,
        "noScale" => 3,
        "noScaleOrReflection" => 4,
        _ => 0,
    }
}

fn resolve_bones(defs: &[BoneDef]) -> Vec<BoneEntry> {
    let mut bones: Vec<BoneEntry> = defs
        .iter()
        .map(|def| BoneEntry {
            name: def.name.clone(),
            parent: 0,
            rotation: def.rotation,
            x: def.x,
            y: def.y,
            scale_x: def.scale_x,
            scale_y: def.scale_y,
            shear_x: def.shear_x,
            shear_y: def.shear_y,
            length: def.length,
            mode: transform_mode(def.transform.as_deref()),
        })
        .collect();

    // Second pass: first bone with a matching name wins. Bone 0 is the root
    // and never writes a parent, so its entry stays 0.
    for (i, def) in defs.iter().enumerate() {
        if let Some(parent_name) = def.parent.as_deref() {
            if !parent_name.is_empty() {
                if let Some(j) = defs.iter().position(|b| b.name == parent_name) {
                    bones[i].parent = j;
                }
            }
        }
    }
    bones
}

fn find_index(names: &[String], name: &str) -> Option<usize> {
    names.iter().position(|n| n == name)
}

fn frames_from<T: DeserializeOwned>(value: &Value) -> Result<Vec<T>, Error> {
    serde_json::from_value(value.clone()).map_err(|e| Error::JsonParse {
        message: e.to_string(),
    })
}

/// One conversion's worth of state: the sink, the atlas filter and every name
/// table published so far. Holding it all in one value keeps `encode`
/// re-entrant.
struct Encoder<'a> {
    out: BinaryOutput<'a>,
    atlas: AtlasIndex,
    bones: Vec<BoneEntry>,
    slots: Vec<String>,
    ik_names: Vec<String>,
    transform_names: Vec<String>,
    path_names: Vec<String>,
    skin_names: Vec<String>,
    events: Vec<EventEntry>,
}

/// Converts a Spine 3.8 JSON skeleton into the binary skeleton format,
/// appending to `out`. `atlas` is the text of the matching `.atlas` file;
/// when present, its region names filter renderable attachments.
///
/// Returns the number of bytes appended. On failure the buffer contents past
/// its prior length are unspecified; [`Error::code`] gives the numeric stage
/// code.
pub fn encode(input: &[u8], out: &mut Vec<u8>, atlas: Option<&str>) -> Result<usize, Error> {
    const TOKEN: &[u8] = b"\"skeleton\"";

    if input.len() < 16 {
        return Err(Error::InputTooShort { len: input.len() });
    }
    if input[0] != b'{' {
        return Err(Error::NotAnObject);
    }
    let head = &input[..input.len().min(18)];
    if !head.windows(TOKEN.len()).any(|w| w == TOKEN) {
        return Err(Error::SkeletonTokenMissing);
    }

    let root = json::parse(input)?;
    let atlas = atlas.map(AtlasIndex::parse).unwrap_or_default();

    let mut encoder = Encoder {
        out: BinaryOutput::new(out),
        atlas,
        bones: Vec::new(),
        slots: Vec::new(),
        ik_names: Vec::new(),
        transform_names: Vec::new(),
        path_names: Vec::new(),
        skin_names: Vec::new(),
        events: Vec::new(),
    };
    encoder.write_document(root)?;
    Ok(encoder.out.position())
}

impl Encoder<'_> {
    fn write_document(&mut self, root: Root) -> Result<(), Error> {
        self.write_header(root.skeleton)?;
        self.write_bones(root.bones.unwrap_or_default())?;
        self.write_slots(root.slots.unwrap_or_default())?;
        self.write_ik(root.ik.unwrap_or_default())?;
        self.write_transforms(root.transform.unwrap_or_default())?;
        self.write_paths(root.path.unwrap_or_default())?;
        self.write_skins(root.skins.map(|s| s.into_entries()).unwrap_or_default())?;
        self.write_events(root.events.unwrap_or_default());
        self.write_animations(root.animations.unwrap_or_default())
    }

    fn write_header(&mut self, header: Option<SkeletonHeader>) -> Result<(), Error> {
        let header = header.ok_or(Error::MissingSkeleton)?;
        let hash = header.hash.as_deref().ok_or(Error::MissingHash)?;
        self.out.write_string(Some(hash));
        let version = header.spine.as_deref().ok_or(Error::MissingVersion)?;
        self.out.write_string(Some(version));
        self.out.write_f32_be(header.width);
        self.out.write_f32_be(header.height);
        // Nonessential data (images path, fps, audio) is never exported.
        self.out.write_bool(false);
        Ok(())
    }

    fn write_bones(&mut self, defs: Vec<BoneDef>) -> Result<(), Error> {
        if defs.is_empty() {
            return Err(Error::MissingBones);
        }
        self.bones = resolve_bones(&defs);

        self.out.write_varint(self.bones.len() as i32, true);
        for i in 0..self.bones.len() {
            let bone = &self.bones[i];
            self.out.write_string(Some(&bone.name));
            if i > 0 {
                self.out.write_varint(bone.parent as i32, true);
            }
            self.out.write_f32_be(bone.rotation);
            self.out.write_f32_be(bone.x);
            self.out.write_f32_be(bone.y);
            self.out.write_f32_be(bone.scale_x);
            self.out.write_f32_be(bone.scale_y);
            self.out.write_f32_be(bone.shear_x);
            self.out.write_f32_be(bone.shear_y);
            self.out.write_f32_be(bone.length);
            self.out.write_varint(bone.mode, true);
        }
        Ok(())
    }

    fn write_slots(&mut self, defs: Vec<SlotDef>) -> Result<(), Error> {
        if defs.is_empty() {
            return Err(Error::MissingSlots);
        }
        self.out.write_varint(defs.len() as i32, true);
        for slot in defs {
            self.out.write_string(Some(&slot.name));

            let bone = self
                .bones
                .iter()
                .position(|b| b.name == slot.bone)
                .ok_or_else(|| Error::UnknownSlotBone {
                    slot: slot.name.clone(),
                    bone: slot.bone.clone(),
                })?;
            self.out.write_varint(bone as i32, true);

            self.out.write_color(slot.color.as_deref());
            self.out.write_color(slot.dark.as_deref());
            self.out
                .write_string(Some(slot.attachment.as_deref().unwrap_or("")));

            let blend = match slot.blend.as_deref() {
                Some("additive") => BLEND_ADDITIVE,
                Some("multiply") => BLEND_MULTIPLY,
                Some("screen") => BLEND_SCREEN,
                _ => BLEND_NORMAL,
            };
            self.out.write_varint(blend, true);

            self.slots.push(slot.name);
        }
        Ok(())
    }

    fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    fn write_ik(&mut self, defs: Vec<IkConstraintDef>) -> Result<(), Error> {
        self.out.write_varint(defs.len() as i32, true);
        for constraint in defs {
            self.out.write_string(Some(&constraint.name));
            self.out.write_varint(constraint.order, true);

            let bones = constraint.bones.ok_or_else(|| Error::IkMissingBones {
                constraint: constraint.name.clone(),
            })?;
            self.out.write_varint(bones.len() as i32, true);
            for bone in &bones {
                let index = self.bone_index(bone).ok_or_else(|| Error::UnknownIkBone {
                    constraint: constraint.name.clone(),
                    bone: bone.clone(),
                })?;
                self.out.write_varint(index as i32, true);
            }

            let target_name = constraint.target.as_deref().unwrap_or("");
            let target = self
                .bone_index(target_name)
                .ok_or_else(|| Error::UnknownIkTarget {
                    constraint: constraint.name.clone(),
                    target: target_name.to_string(),
                })?;
            self.out.write_varint(target as i32, true);

            self.out.write_f32_be(constraint.mix);
            self.out
                .write_f32_be(if constraint.bend_positive { 1.0 } else { -1.0 });

            self.ik_names.push(constraint.name);
        }
        Ok(())
    }

    fn write_transforms(&mut self, defs: Vec<TransformConstraintDef>) -> Result<(), Error> {
        self.out.write_varint(defs.len() as i32, true);
        for constraint in defs {
            self.out.write_string(Some(&constraint.name));
            self.out.write_varint(constraint.order, true);

            let bones = constraint
                .bones
                .ok_or_else(|| Error::TransformMissingBones {
                    constraint: constraint.name.clone(),
                })?;
            self.out.write_varint(bones.len() as i32, true);
            for bone in &bones {
                let index = self
                    .bone_index(bone)
                    .ok_or_else(|| Error::UnknownTransformBone {
                        constraint: constraint.name.clone(),
                        bone: bone.clone(),
                    })?;
                self.out.write_varint(index as i32, true);
            }

            let target_name = constraint.target.as_deref().unwrap_or("");
            let target = self
                .bone_index(target_name)
                .ok_or_else(|| Error::UnknownTransformTarget {
                    constraint: constraint.name.clone(),
                    target: target_name.to_string(),
                })?;
            self.out.write_varint(target as i32, true);

            self.out.write_bool(constraint.local);
            self.out.write_bool(constraint.relative);

            self.out.write_f32_be(constraint.rotation);
            self.out.write_f32_be(constraint.x);
            self.out.write_f32_be(constraint.y);
            self.out.write_f32_be(constraint.scale_x);
            self.out.write_f32_be(constraint.scale_y);
            self.out.write_f32_be(constraint.shear_y);
            self.out.write_f32_be(constraint.rotate_mix);
            self.out.write_f32_be(constraint.translate_mix);
            self.out.write_f32_be(constraint.scale_mix);
            self.out.write_f32_be(constraint.shear_mix);

            self.transform_names.push(constraint.name);
        }
        Ok(())
    }

    fn write_paths(&mut self, defs: Vec<PathConstraintDef>) -> Result<(), Error> {
        self.out.write_varint(defs.len() as i32, true);
        for constraint in defs {
            self.out.write_string(Some(&constraint.name));
            self.out.write_varint(constraint.order, true);

            let bones = constraint.bones.ok_or_else(|| Error::PathMissingBones {
                constraint: constraint.name.clone(),
            })?;
            self.out.write_varint(bones.len() as i32, true);
            for bone in &bones {
                let index = self
                    .bone_index(bone)
                    .ok_or_else(|| Error::UnknownPathBone {
                        constraint: constraint.name.clone(),
                        bone: bone.clone(),
                    })?;
                self.out.write_varint(index as i32, true);
            }

            // Path constraints target a slot holding a path attachment, not
            // a bone.
            let target_name = constraint.target.as_deref().unwrap_or("");
            let target =
                find_index(&self.slots, target_name).ok_or_else(|| Error::UnknownPathTarget {
                    constraint: constraint.name.clone(),
                    slot: target_name.to_string(),
                })?;
            self.out.write_varint(target as i32, true);

            let position_mode = match constraint.position_mode.as_deref() {
                Some("fixed") => POSITION_FIXED,
                _ => POSITION_PERCENT,
            };
            self.out.write_varint(position_mode, true);

            let spacing_mode = match constraint.spacing_mode.as_deref() {
                Some("fixed") => SPACING_FIXED,
                Some("percent") => SPACING_PERCENT,
                _ => SPACING_LENGTH,
            };
            self.out.write_varint(spacing_mode, true);

            let rotate_mode = match constraint.rotate_mode.as_deref() {
                Some("chain") => ROTATE_CHAIN,
                Some("chainScale") => ROTATE_CHAIN_SCALE,
                _ => ROTATE_TANGENT,
            };
            self.out.write_varint(rotate_mode, true);

            self.out.write_f32_be(constraint.rotation);
            self.out.write_f32_be(constraint.position);
            self.out.write_f32_be(constraint.spacing);
            self.out.write_f32_be(constraint.rotate_mix);
            self.out.write_f32_be(constraint.translate_mix);

            self.path_names.push(constraint.name);
        }
        Ok(())
    }

    fn write_skins(&mut self, skins: Vec<(String, SkinSlots)>) -> Result<(), Error> {
        if skins.is_empty() {
            return Err(Error::MissingSkins);
        }

        // The default skin is written first and unnamed; the decoder only
        // learns named-skin count afterwards, so a document without one has
        // no legal encoding.
        let (_, default_skin) = skins
            .iter()
            .find(|(name, _)| name == "default")
            .ok_or(Error::MissingDefaultSkin)?;
        self.write_skin_entries("default", default_skin)?;
        self.skin_names.push("default".to_string());

        self.out.write_varint(skins.len() as i32 - 1, true);
        for (name, slots) in &skins {
            if name != "default" {
                self.skin_names.push(name.clone());
                self.out.write_string(Some(name));
                self.write_skin_entries(name, slots)?;
            }
        }
        Ok(())
    }

    fn write_skin_entries(&mut self, skin_name: &str, skin: &SkinSlots) -> Result<(), Error> {
        self.out.write_varint(skin.len() as i32, true);
        for (slot_name, attachments) in skin.iter() {
            let slot =
                find_index(&self.slots, slot_name).ok_or_else(|| Error::UnknownSkinSlot {
                    skin: skin_name.to_string(),
                    slot: slot_name.clone(),
                })?;
            self.out.write_varint(slot as i32, true);

            let kept: Vec<&(String, AttachmentDef)> = attachments
                .iter()
                .filter(|(placeholder, attachment)| self.keeps_attachment(placeholder, attachment))
                .collect();
            self.out.write_varint(kept.len() as i32, true);
            for (placeholder, attachment) in kept {
                self.write_attachment(placeholder, attachment);
            }
        }
        Ok(())
    }

    /// Atlas filtering only applies to attachment types backed by a packed
    /// image; logical attachments (bounding boxes, paths, points, clipping)
    /// always survive.
    fn keeps_attachment(&self, placeholder: &str, attachment: &AttachmentDef) -> bool {
        if self.atlas.is_empty() {
            return true;
        }
        match attachment.attachment_type.as_deref().unwrap_or("region") {
            "region" | "mesh" | "linkedmesh" => {
                let name = attachment.name.as_deref().unwrap_or(placeholder);
                self.atlas.contains(name)
            }
            _ => true,
        }
    }

    fn write_attachment(&mut self, placeholder: &str, attachment: &AttachmentDef) {
        let actual_name = attachment.name.as_deref().unwrap_or(placeholder);
        self.out.write_string(Some(placeholder));
        self.out.write_string(Some(actual_name));

        match attachment.attachment_type.as_deref().unwrap_or("region") {
            "boundingbox" => {
                self.out.write_u8(ATTACHMENT_BOUNDING_BOX);
                let vertex_count = (attachment.vertex_count << 1) as i32;
                self.out.write_varint(vertex_count, true);
                self.write_vertices(attachment.vertices.as_deref(), vertex_count as usize);
            }
            "mesh" => {
                self.out.write_u8(ATTACHMENT_MESH);
                self.out.write_string(attachment.path.as_deref());
                self.out.write_color(attachment.color.as_deref());

                let uvs = attachment.uvs.as_deref().unwrap_or(&[]);
                let vertices_length = uvs.len();
                self.out.write_varint((vertices_length >> 1) as i32, true);
                for &uv in uvs {
                    self.out.write_f32_be(uv);
                }

                let triangles = attachment.triangles.as_deref().unwrap_or(&[]);
                self.out.write_varint(triangles.len() as i32, true);
                for &triangle in triangles {
                    self.out.write_u16_be(triangle as u16);
                }

                self.write_vertices(attachment.vertices.as_deref(), vertices_length);
                self.out.write_varint((attachment.hull >> 1) as i32, true);
            }
            "linkedmesh" => {
                self.out.write_u8(ATTACHMENT_LINKED_MESH);
                self.out.write_string(attachment.path.as_deref());
                self.out.write_color(attachment.color.as_deref());
                self.out.write_string(attachment.skin.as_deref());
                self.out.write_string(attachment.parent.as_deref());
                self.out.write_bool(attachment.deform);
            }
            "path" => {
                self.out.write_u8(ATTACHMENT_PATH);
                self.out.write_bool(attachment.closed);
                self.out.write_bool(attachment.constant_speed);

                let vertex_count = attachment.vertex_count as i32;
                self.out.write_varint(vertex_count, true);
                self.write_vertices(
                    attachment.vertices.as_deref(),
                    (attachment.vertex_count << 1) as usize,
                );

                for &length in attachment.lengths.as_deref().unwrap_or(&[]) {
                    self.out.write_f32_be(length);
                }
            }
            "point" => {
                self.out.write_u8(ATTACHMENT_POINT);
                self.out.write_f32_be(attachment.x);
                self.out.write_f32_be(attachment.y);
                self.out.write_f32_be(attachment.rotation);
            }
            "clipping" => {
                self.out.write_u8(ATTACHMENT_CLIPPING);
                let end = attachment
                    .end
                    .as_deref()
                    .and_then(|name| find_index(&self.slots, name))
                    .unwrap_or(0);
                self.out.write_varint(end as i32, true);

                self.out.write_varint(attachment.vertex_count as i32, true);
                self.write_vertices(
                    attachment.vertices.as_deref(),
                    (attachment.vertex_count << 1) as usize,
                );
            }
            // Anything else, including an absent type, is a region.
            _ => {
                self.out.write_u8(ATTACHMENT_REGION);
                // An absent path makes the decoder fall back to the name.
                self.out.write_string(attachment.path.as_deref());
                self.out.write_f32_be(attachment.rotation);
                self.out.write_f32_be(attachment.x);
                self.out.write_f32_be(attachment.y);
                self.out.write_f32_be(attachment.scale_x);
                self.out.write_f32_be(attachment.scale_y);
                self.out.write_f32_be(attachment.width);
                self.out.write_f32_be(attachment.height);
                self.out.write_color(attachment.color.as_deref());
            }
        }
    }

    /// A raw array matching the expected plain length is unweighted; any
    /// other length means the array is a stream of
    /// `(boneCount, [boneIndex, x, y, weight] × boneCount)` tuples per
    /// vertex. An empty array emits nothing at all.
    fn write_vertices(&mut self, vertices: Option<&[f32]>, expected_len: usize) {
        let vertices = vertices.unwrap_or(&[]);
        if vertices.is_empty() {
            return;
        }

        if vertices.len() == expected_len {
            self.out.write_bool(false);
            for &v in vertices {
                self.out.write_f32_be(v);
            }
            return;
        }

        self.out.write_bool(true);
        let mut i = 0;
        while i < vertices.len() {
            let bone_count = vertices[i] as i32;
            i += 1;
            self.out.write_varint(bone_count, true);
            for _ in 0..bone_count {
                let Some(tuple) = vertices.get(i..i + 4) else {
                    return;
                };
                self.out.write_varint(tuple[0] as i32, true);
                self.out.write_f32_be(tuple[1]);
                self.out.write_f32_be(tuple[2]);
                self.out.write_f32_be(tuple[3]);
                i += 4;
            }
        }
    }

    fn write_events(&mut self, events: json::Entries<EventDef>) {
        self.out.write_varint(events.len() as i32, true);
        for (name, def) in events.0 {
            self.out.write_string(Some(&name));
            self.out.write_varint(def.int_value, false);
            self.out.write_f32_be(def.float_value);
            self.out.write_string(def.string_value.as_deref());

            // int/float defaults feed event timelines later.
            self.events.push(EventEntry {
                name,
                int_value: def.int_value,
                float_value: def.float_value,
            });
        }
    }

    fn write_animations(&mut self, animations: json::Entries<AnimationDef>) -> Result<(), Error> {
        self.out.write_varint(animations.len() as i32, true);
        for (name, animation) in animations.0 {
            self.out.write_string(Some(&name));
            self.write_animation(&name, &animation)?;
            debug!(animation = name.as_str(), "encoded animation");
        }
        Ok(())
    }

    fn write_animation(&mut self, animation: &str, anim: &AnimationDef) -> Result<(), Error> {
        self.write_slot_timelines(animation, anim)?;
        self.write_bone_timelines(animation, anim)?;
        self.write_ik_timelines(animation, anim)?;
        self.write_transform_timelines(animation, anim)?;
        self.write_path_timelines(animation, anim)?;
        self.write_deform_timelines(animation, anim)?;
        self.write_draw_order_timeline(animation, anim)?;
        self.write_event_timeline(animation, anim)
    }

    fn write_slot_timelines(&mut self, animation: &str, anim: &AnimationDef) -> Result<(), Error> {
        self.out.write_varint(anim.slots.len() as i32, true);
        for (slot_name, timelines) in anim.slots.iter() {
            let slot =
                find_index(&self.slots, slot_name).ok_or_else(|| Error::UnknownAnimationSlot {
                    animation: animation.to_string(),
                    slot: slot_name.clone(),
                })?;
            self.out.write_varint(slot as i32, true);

            self.out.write_varint(timelines.len() as i32, true);
            for (timeline_name, raw_frames) in timelines.iter() {
                match timeline_name.as_str() {
                    "attachment" => {
                        self.out.write_u8(SLOT_ATTACHMENT);
                        let frames: Vec<AttachmentKey> = frames_from(raw_frames)?;
                        self.out.write_varint(frames.len() as i32, true);
                        for frame in &frames {
                            self.out.write_f32_be(frame.time);
                            self.out
                                .write_string(Some(frame.name.as_deref().unwrap_or("")));
                        }
                    }
                    "color" => {
                        self.out.write_u8(SLOT_COLOR);
                        let frames: Vec<ColorKey> = frames_from(raw_frames)?;
                        self.out.write_varint(frames.len() as i32, true);
                        for (i, frame) in frames.iter().enumerate() {
                            self.out.write_f32_be(frame.time);
                            self.out.write_color(frame.color.as_deref());
                            if i + 1 < frames.len() {
                                self.write_curve(frame.curve.as_ref());
                            }
                        }
                    }
                    "twoColor" => {
                        self.out.write_u8(SLOT_TWO_COLOR);
                        let frames: Vec<TwoColorKey> = frames_from(raw_frames)?;
                        self.out.write_varint(frames.len() as i32, true);
                        for (i, frame) in frames.iter().enumerate() {
                            self.out.write_f32_be(frame.time);
                            self.out.write_color(frame.light.as_deref());
                            self.out.write_color(frame.dark.as_deref());
                            if i + 1 < frames.len() {
                                self.write_curve(frame.curve.as_ref());
                            }
                        }
                    }
                    other => {
                        return Err(Error::UnknownSlotTimeline {
                            animation: animation.to_string(),
                            slot: slot_name.clone(),
                            timeline: other.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn write_bone_timelines(&mut self, animation: &str, anim: &AnimationDef) -> Result<(), Error> {
        self.out.write_varint(anim.bones.len() as i32, true);
        for (bone_name, timelines) in anim.bones.iter() {
            let bone = self
                .bone_index(bone_name)
                .ok_or_else(|| Error::UnknownAnimationBone {
                    animation: animation.to_string(),
                    bone: bone_name.clone(),
                })?;
            self.out.write_varint(bone as i32, true);

            self.out.write_varint(timelines.len() as i32, true);
            for (timeline_name, raw_frames) in timelines.iter() {
                match timeline_name.as_str() {
                    "rotate" => {
                        self.out.write_u8(BONE_ROTATE);
                        let frames: Vec<RotateKey> = frames_from(raw_frames)?;
                        self.out.write_varint(frames.len() as i32, true);
                        for (i, frame) in frames.iter().enumerate() {
                            self.out.write_f32_be(frame.time);
                            self.out.write_f32_be(frame.angle);
                            if i + 1 < frames.len() {
                                self.write_curve(frame.curve.as_ref());
                            }
                        }
                    }
                    "translate" | "scale" | "shear" => {
                        self.out.write_u8(match timeline_name.as_str() {
                            "translate" => BONE_TRANSLATE,
                            "scale" => BONE_SCALE,
                            _ => BONE_SHEAR,
                        });
                        let frames: Vec<Vec2Key> = frames_from(raw_frames)?;
                        self.out.write_varint(frames.len() as i32, true);
                        for (i, frame) in frames.iter().enumerate() {
                            self.out.write_f32_be(frame.time);
                            self.out.write_f32_be(frame.x);
                            self.out.write_f32_be(frame.y);
                            if i + 1 < frames.len() {
                                self.write_curve(frame.curve.as_ref());
                            }
                        }
                    }
                    other => {
                        return Err(Error::UnknownBoneTimeline {
                            animation: animation.to_string(),
                            bone: bone_name.clone(),
                            timeline: other.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn write_ik_timelines(&mut self, animation: &str, anim: &AnimationDef) -> Result<(), Error> {
        self.out.write_varint(anim.ik.len() as i32, true);
        for (constraint_name, frames) in anim.ik.iter() {
            let index = find_index(&self.ik_names, constraint_name).ok_or_else(|| {
                Error::UnknownAnimationIk {
                    animation: animation.to_string(),
                    constraint: constraint_name.clone(),
                }
            })?;
            self.out.write_varint(index as i32, true);

            self.out.write_varint(frames.len() as i32, true);
            for (i, frame) in frames.iter().enumerate() {
                self.out.write_f32_be(frame.time);
                self.out.write_f32_be(frame.mix);
                let bend: i8 = if frame.bend_positive { 1 } else { -1 };
                self.out.write_u8(bend as u8);
                if i + 1 < frames.len() {
                    self.write_curve(frame.curve.as_ref());
                }
            }
        }
        Ok(())
    }

    fn write_transform_timelines(
        &mut self,
        animation: &str,
        anim: &AnimationDef,
    ) -> Result<(), Error> {
        self.out.write_varint(anim.transform.len() as i32, true);
        for (constraint_name, frames) in anim.transform.iter() {
            let index = find_index(&self.transform_names, constraint_name).ok_or_else(|| {
                Error::UnknownAnimationTransform {
                    animation: animation.to_string(),
                    constraint: constraint_name.clone(),
                }
            })?;
            self.out.write_varint(index as i32, true);

            self.out.write_varint(frames.len() as i32, true);
            for (i, frame) in frames.iter().enumerate() {
                self.out.write_f32_be(frame.time);
                self.out.write_f32_be(frame.rotate_mix);
                self.out.write_f32_be(frame.translate_mix);
                self.out.write_f32_be(frame.scale_mix);
                self.out.write_f32_be(frame.shear_mix);
                if i + 1 < frames.len() {
                    self.write_curve(frame.curve.as_ref());
                }
            }
        }
        Ok(())
    }

    fn write_path_timelines(&mut self, animation: &str, anim: &AnimationDef) -> Result<(), Error> {
        self.out.write_varint(anim.paths.len() as i32, true);
        for (constraint_name, timelines) in anim.paths.iter() {
            let index = find_index(&self.path_names, constraint_name).ok_or_else(|| {
                Error::UnknownAnimationPath {
                    animation: animation.to_string(),
                    constraint: constraint_name.clone(),
                }
            })?;
            self.out.write_varint(index as i32, true);

            self.out.write_varint(timelines.len() as i32, true);
            for (timeline_name, raw_frames) in timelines.iter() {
                match timeline_name.as_str() {
                    "position" | "spacing" => {
                        let position = timeline_name == "position";
                        self.out
                            .write_u8(if position { PATH_POSITION } else { PATH_SPACING });
                        let frames: Vec<PathValueKey> = frames_from(raw_frames)?;
                        self.out.write_varint(frames.len() as i32, true);
                        for (i, frame) in frames.iter().enumerate() {
                            self.out.write_f32_be(frame.time);
                            self.out
                                .write_f32_be(if position { frame.position } else { frame.spacing });
                            if i + 1 < frames.len() {
                                self.write_curve(frame.curve.as_ref());
                            }
                        }
                    }
                    "mix" => {
                        self.out.write_u8(PATH_MIX);
                        let frames: Vec<PathMixKey> = frames_from(raw_frames)?;
                        self.out.write_varint(frames.len() as i32, true);
                        for (i, frame) in frames.iter().enumerate() {
                            self.out.write_f32_be(frame.time);
                            self.out.write_f32_be(frame.rotate_mix);
                            self.out.write_f32_be(frame.translate_mix);
                            if i + 1 < frames.len() {
                                self.write_curve(frame.curve.as_ref());
                            }
                        }
                    }
                    other => {
                        return Err(Error::UnknownPathTimeline {
                            animation: animation.to_string(),
                            constraint: constraint_name.clone(),
                            timeline: other.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn write_deform_timelines(
        &mut self,
        animation: &str,
        anim: &AnimationDef,
    ) -> Result<(), Error> {
        self.out.write_varint(anim.deform.len() as i32, true);
        for (skin_name, slots) in anim.deform.iter() {
            let skin = find_index(&self.skin_names, skin_name).ok_or_else(|| {
                Error::UnknownDeformSkin {
                    animation: animation.to_string(),
                    skin: skin_name.clone(),
                }
            })?;
            self.out.write_varint(skin as i32, true);

            self.out.write_varint(slots.len() as i32, true);
            for (slot_name, timelines) in slots.iter() {
                let slot =
                    find_index(&self.slots, slot_name).ok_or_else(|| Error::UnknownDeformSlot {
                        animation: animation.to_string(),
                        slot: slot_name.clone(),
                    })?;
                self.out.write_varint(slot as i32, true);

                self.out.write_varint(timelines.len() as i32, true);
                for (attachment_name, frames) in timelines.iter() {
                    self.out.write_string(Some(attachment_name));

                    self.out.write_varint(frames.len() as i32, true);
                    for (i, frame) in frames.iter().enumerate() {
                        self.out.write_f32_be(frame.time);
                        self.write_deform_vertices(frame);
                        if i + 1 < frames.len() {
                            self.write_curve(frame.curve.as_ref());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Sparse vertex block: count, then (only when non-empty) the start
    /// offset and the raw floats. A frame without vertices keys the setup
    /// pose.
    fn write_deform_vertices(&mut self, frame: &DeformKey) {
        match frame.vertices.as_deref() {
            Some(vertices) if !vertices.is_empty() => {
                self.out.write_varint(vertices.len() as i32, true);
                self.out.write_varint(frame.offset as i32, true);
                for &v in vertices {
                    self.out.write_f32_be(v);
                }
            }
            _ => self.out.write_varint(0, true),
        }
    }

    fn write_draw_order_timeline(
        &mut self,
        animation: &str,
        anim: &AnimationDef,
    ) -> Result<(), Error> {
        self.out.write_varint(anim.draw_order.len() as i32, true);
        for frame in &anim.draw_order {
            self.out.write_f32_be(frame.time);

            self.out.write_varint(frame.offsets.len() as i32, true);
            for offset in &frame.offsets {
                let slot_name = offset.slot.as_deref().unwrap_or("");
                let slot = find_index(&self.slots, slot_name).ok_or_else(|| {
                    Error::UnknownDrawOrderSlot {
                        animation: animation.to_string(),
                        slot: slot_name.to_string(),
                    }
                })?;
                self.out.write_varint(slot as i32, true);
                // Offsets move slots both directions, so they ride zig-zag.
                self.out.write_varint(offset.offset, false);
            }
        }
        Ok(())
    }

    fn write_event_timeline(&mut self, animation: &str, anim: &AnimationDef) -> Result<(), Error> {
        self.out.write_varint(anim.events.len() as i32, true);
        for frame in &anim.events {
            let name = frame.name.as_deref().ok_or_else(|| Error::MissingEventName {
                animation: animation.to_string(),
            })?;
            self.out.write_f32_be(frame.time);

            let index = self
                .events
                .iter()
                .position(|e| e.name == name)
                .ok_or_else(|| Error::UnknownEvent {
                    animation: animation.to_string(),
                    event: name.to_string(),
                })?;
            self.out.write_varint(index as i32, true);

            let event = &self.events[index];
            self.out
                .write_varint(frame.int_value.unwrap_or(event.int_value), false);
            self.out
                .write_f32_be(frame.float_value.unwrap_or(event.float_value));
            match frame.string_value.as_deref() {
                Some(s) => {
                    self.out.write_bool(true);
                    self.out.write_string(Some(s));
                }
                None => self.out.write_bool(false),
            }
        }
        Ok(())
    }

    /// Interpolation tag between two frames: absent or anything unrecognized
    /// is linear, the literal `"stepped"` is stepped, a four-float array is
    /// a Bezier.
    fn write_curve(&mut self, curve: Option<&Value>) {
        match curve {
            Some(Value::String(s)) if s == "stepped" => self.out.write_u8(CURVE_STEPPED),
            Some(Value::Array(points)) => {
                self.out.write_u8(CURVE_BEZIER);
                for i in 0..4 {
                    let v = points.get(i).and_then(Value::as_f64).unwrap_or(0.0);
                    self.out.write_f32_be(v as f32);
                }
            }
            _ => self.out.write_u8(CURVE_LINEAR),
        }
    }
}
