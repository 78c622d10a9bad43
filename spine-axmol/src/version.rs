//! Target Spine export version.

/// Target Spine major version for exported data.
pub const SPINE_EXPORT_MAJOR: u32 = 3;

/// Target Spine minor version for exported data.
pub const SPINE_EXPORT_MINOR: u32 = 8;
