//! The layout constants of the dependency-artifact format.
//!
//! An artifact is the 4-byte signature followed by a sequence of tagged
//! records:
//!
//! - `METADATA` — always first: format major/minor versions and the
//!   producing compiler's version string. Readers reject unknown majors and
//!   accept newer minors.
//! - `IDENTIFIER` — one per unique string, referenced by 1-based sequence
//!   number. Identifier 0 is always the empty string and is never written.
//! - `NODE` — one per dependency node, in deterministic traversal order.
//!   A node with a fingerprint is followed by a `FINGERPRINT` record; a use
//!   node is followed by a `DEPENDS_ON` record anchoring its arc.
//! - `EXTERNAL` — the module's incremental external dependencies, last.

/// Every dependency artifact begins with these 4 bytes, for easy
/// identification when debugging.
pub const SIGNATURE: [u8; 4] = *b"DDEP";

/// The format major version; readers reject anything else.
pub const FORMAT_VERSION_MAJOR: u16 = 1;

/// The format minor version. Increment this on every compatible change.
pub const FORMAT_VERSION_MINOR: u16 = 0;

/// Record tags, each written as a fixed 8-bit field.
pub mod record {
    /// Format versions and compiler version string.
    pub const METADATA: u8 = 1;

    /// One dependency node.
    pub const NODE: u8 = 2;

    /// The fingerprint of the preceding node.
    pub const FINGERPRINT: u8 = 3;

    /// One interned string.
    pub const IDENTIFIER: u8 = 4;

    /// One incremental external dependency path.
    pub const EXTERNAL: u8 = 5;

    /// The arc anchoring the preceding use node.
    pub const DEPENDS_ON: u8 = 6;
}

/// Width of the record tag field.
pub const RECORD_TAG_WIDTH: u32 = 8;

/// Width of the node-kind field.
pub const NODE_KIND_WIDTH: u32 = 3;

/// Width of the aspect field.
pub const ASPECT_WIDTH: u32 = 1;

/// Chunk width of identifier references and node sequence numbers.
pub const ID_VBR_WIDTH: u32 = 13;

/// Width of each format version field in the metadata record.
pub const VERSION_WIDTH: u32 = 16;

/// The version string stamped into artifact metadata.
///
/// The string does not gate decoding — only the major/minor pair does —
/// but it is surfaced in debug logs when artifacts from another compiler
/// build are loaded.
#[must_use]
pub fn compiler_version() -> String {
    format!("veldc {}", env!("CARGO_PKG_VERSION"))
}
