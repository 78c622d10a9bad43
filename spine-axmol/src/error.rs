use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("attachment '{attachment}' not found for slot '{slot}'")]
    UnknownAttachment { slot: String, attachment: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("failed to parse Spine atlas: {message}")]
    AtlasParse { message: String },

    #[error("resource not found: {path}")]
    ResourceNotFound { path: String },

    #[error("texture '{path}' could not be loaded")]
    TextureNotFound { path: String },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "json")]
    #[error("failed to parse Spine JSON: {message}")]
    JsonParse { message: String },

    #[cfg(feature = "json")]
    #[error("invalid color '{value}' for {context}")]
    JsonInvalidColor { context: String, value: String },

    #[cfg(feature = "json")]
    #[error("invalid curve for {context}: {message}")]
    JsonInvalidCurve { context: String, message: String },

    #[cfg(feature = "json")]
    #[error("unsupported or invalid Spine version string: {value}")]
    JsonSpineVersion { value: String },

    #[cfg(feature = "json")]
    #[error("unknown parent bone '{parent}' for bone '{bone}'")]
    JsonUnknownBoneParent { bone: String, parent: String },

    #[cfg(feature = "json")]
    #[error("unknown bone '{bone}' referenced by slot '{slot}'")]
    JsonUnknownSlotBone { slot: String, bone: String },

    #[cfg(feature = "json")]
    #[error("unsupported blend mode '{value}' for slot '{slot}'")]
    JsonUnsupportedBlendMode { slot: String, value: String },

    #[cfg(feature = "json")]
    #[error("unknown {kind} '{name}' referenced by animation '{animation}'")]
    JsonUnknownAnimationTarget {
        animation: String,
        kind: &'static str,
        name: String,
    },

    #[cfg(feature = "json")]
    #[error("unknown slot '{slot}' referenced by skin '{skin}'")]
    JsonUnknownSkinSlot { skin: String, slot: String },

    #[cfg(feature = "json")]
    #[error(
        "invalid mesh data for skin '{skin}', slot '{slot}', attachment '{attachment}': {message}"
    )]
    JsonInvalidMeshData {
        skin: String,
        slot: String,
        attachment: String,
        message: String,
    },

    #[cfg(feature = "json")]
    #[error("unknown parent mesh '{parent}' for linked mesh '{attachment}' in skin '{skin}'")]
    JsonUnknownLinkedMeshParent {
        skin: String,
        attachment: String,
        parent: String,
    },

    #[cfg(feature = "json")]
    #[error(
        "invalid deform data for animation '{animation}', slot '{slot}', attachment '{attachment}': {message}"
    )]
    JsonInvalidDeformData {
        animation: String,
        slot: String,
        attachment: String,
        message: String,
    },

    #[cfg(feature = "json")]
    #[error("invalid drawOrder data for animation '{animation}': {message}")]
    JsonInvalidDrawOrder { animation: String, message: String },
}
