use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("input too short ({len} bytes)")]
    InputTooShort { len: usize },

    #[error("input is not a JSON object")]
    NotAnObject,

    #[error("input does not start with a \"skeleton\" header")]
    SkeletonTokenMissing,

    #[error("failed to parse Spine JSON: {message}")]
    JsonParse { message: String },

    #[error("missing 'skeleton' object")]
    MissingSkeleton,

    #[error("missing 'skeleton.hash'")]
    MissingHash,

    #[error("missing 'skeleton.spine'")]
    MissingVersion,

    #[error("missing or empty 'bones' list")]
    MissingBones,

    #[error("missing or empty 'slots' list")]
    MissingSlots,

    #[error("unknown bone '{bone}' referenced by slot '{slot}'")]
    UnknownSlotBone { slot: String, bone: String },

    #[error("IK constraint '{constraint}' has no 'bones' list")]
    IkMissingBones { constraint: String },

    #[error("unknown bone '{bone}' referenced by IK constraint '{constraint}'")]
    UnknownIkBone { constraint: String, bone: String },

    #[error("unknown target bone '{target}' referenced by IK constraint '{constraint}'")]
    UnknownIkTarget { constraint: String, target: String },

    #[error("transform constraint '{constraint}' has no 'bones' list")]
    TransformMissingBones { constraint: String },

    #[error("unknown bone '{bone}' referenced by transform constraint '{constraint}'")]
    UnknownTransformBone { constraint: String, bone: String },

    #[error("unknown target bone '{target}' referenced by transform constraint '{constraint}'")]
    UnknownTransformTarget { constraint: String, target: String },

    #[error("path constraint '{constraint}' has no 'bones' list")]
    PathMissingBones { constraint: String },

    #[error("unknown bone '{bone}' referenced by path constraint '{constraint}'")]
    UnknownPathBone { constraint: String, bone: String },

    #[error("unknown target slot '{slot}' referenced by path constraint '{constraint}'")]
    UnknownPathTarget { constraint: String, slot: String },

    #[error("missing or empty 'skins' object")]
    MissingSkins,

    #[error("no 'default' skin")]
    MissingDefaultSkin,

    #[error("unknown slot '{slot}' referenced by skin '{skin}'")]
    UnknownSkinSlot { skin: String, slot: String },

    #[error("unknown slot '{slot}' referenced by animation '{animation}'")]
    UnknownAnimationSlot { animation: String, slot: String },

    #[error("unknown slot timeline '{timeline}' for slot '{slot}' in animation '{animation}'")]
    UnknownSlotTimeline {
        animation: String,
        slot: String,
        timeline: String,
    },

    #[error("unknown bone '{bone}' referenced by animation '{animation}'")]
    UnknownAnimationBone { animation: String, bone: String },

    #[error("unknown bone timeline '{timeline}' for bone '{bone}' in animation '{animation}'")]
    UnknownBoneTimeline {
        animation: String,
        bone: String,
        timeline: String,
    },

    #[error("unknown IK constraint '{constraint}' referenced by animation '{animation}'")]
    UnknownAnimationIk {
        animation: String,
        constraint: String,
    },

    #[error("unknown transform constraint '{constraint}' referenced by animation '{animation}'")]
    UnknownAnimationTransform {
        animation: String,
        constraint: String,
    },

    #[error("unknown path constraint '{constraint}' referenced by animation '{animation}'")]
    UnknownAnimationPath {
        animation: String,
        constraint: String,
    },

    #[error(
        "unknown path timeline '{timeline}' for constraint '{constraint}' in animation '{animation}'"
    )]
    UnknownPathTimeline {
        animation: String,
        constraint: String,
        timeline: String,
    },

    #[error("unknown skin '{skin}' referenced by deform timeline in animation '{animation}'")]
    UnknownDeformSkin { animation: String, skin: String },

    #[error("unknown slot '{slot}' referenced by deform timeline in animation '{animation}'")]
    UnknownDeformSlot { animation: String, slot: String },

    #[error("unknown slot '{slot}' referenced by draw order timeline in animation '{animation}'")]
    UnknownDrawOrderSlot { animation: String, slot: String },

    #[error("event frame without a name in animation '{animation}'")]
    MissingEventName { animation: String },

    #[error("unknown event '{event}' referenced by animation '{animation}'")]
    UnknownEvent { animation: String, event: String },
}

impl Error {
    /// Stable negative status code for this failure, for callers that report
    /// results as an integer.
    ///
    /// Codes are banded by stage: preflight (−1…−4), header/structural
    /// (−5…−10), constraints (−11…−19), skins (−20 and −100/−200 composites),
    /// animations (−300 composites).
    pub fn code(&self) -> i32 {
        match self {
            Error::InputTooShort { .. } => -1,
            Error::NotAnObject => -2,
            Error::SkeletonTokenMissing => -3,
            Error::JsonParse { .. } => -4,
            Error::MissingSkeleton => -5,
            Error::MissingHash => -6,
            Error::MissingVersion => -7,
            Error::MissingBones => -8,
            Error::MissingSlots => -9,
            Error::UnknownSlotBone { .. } => -10,
            Error::IkMissingBones { .. } => -11,
            Error::UnknownIkBone { .. } => -12,
            Error::UnknownIkTarget { .. } => -13,
            Error::TransformMissingBones { .. } => -14,
            Error::UnknownTransformBone { .. } => -15,
            Error::UnknownTransformTarget { .. } => -16,
            Error::PathMissingBones { .. } => -17,
            Error::UnknownPathBone { .. } => -18,
            Error::UnknownPathTarget { .. } => -19,
            Error::MissingSkins | Error::MissingDefaultSkin => -20,
            Error::UnknownSkinSlot { skin, .. } => {
                if skin == "default" {
                    -100 - 1
                } else {
                    -200 - 1
                }
            }
            Error::UnknownAnimationSlot { .. } => -300 - 1,
            Error::UnknownSlotTimeline { .. } => -300 - 2,
            Error::UnknownAnimationBone { .. } => -300 - 3,
            Error::UnknownBoneTimeline { .. } => -300 - 4,
            Error::UnknownAnimationIk { .. } => -300 - 5,
            Error::UnknownAnimationTransform { .. } => -300 - 6,
            Error::UnknownAnimationPath { .. } => -300 - 7,
            Error::UnknownPathTimeline { .. } => -300 - 8,
            Error::UnknownDeformSkin { .. } => -300 - 9,
            Error::UnknownDeformSlot { .. } => -300 - 10,
            Error::UnknownDrawOrderSlot { .. } => -300 - 11,
            Error::MissingEventName { .. } => -300 - 12,
            Error::UnknownEvent { .. } => -300 - 13,
        }
    }
}
