//! # packet-schema: Packet Field Schema Engine
//!
//! Model, normalize, validate and edit the field layout of binary packets
//! (headers, payload structures, checksums) as a recursive tree of typed fields.
//!
//! ## Representations
//!
//! - **Editing tree**: [`FieldNode`]s owned by a [`FieldTree`] session, carrying
//!   editor state (`expanded`, derived `level`, `parent_id` back-references).
//! - **Canonical schema**: minimal JSON objects with only the attributes
//!   whitelisted for each field type, ready to persist or hand to a code generator.
//!
//! ## Field types
//!
//! - Scalars: `SignedInt`, `UnsignedInt`, `Float`, `String`, `Bcd`, `Timestamp`, `MessageId`
//! - Bit-level and tables: `Bitfield` (sub-fields), `Encode` (value → meaning maps)
//! - Containers: `Struct` (ordered fields), `Array` (one element + a length mode),
//!   `Command` (discriminant-keyed branches)
//! - Framing: `Checksum`, `Padding`, `Reserved`
//!
//! ## Example schema
//!
//! ```text
//! [
//!   { "type": "MessageId", "field_name": "msg_id", "byte_length": 2,
//!     "value_type": "UnsignedInt", "message_id_value": 1 },
//!   { "type": "UnsignedInt", "field_name": "n", "byte_length": 1 },
//!   { "type": "Array", "field_name": "items", "count_from_field": "n",
//!     "element": { "type": "SignedInt", "field_name": "item", "byte_length": 2 } },
//!   { "type": "Checksum", "field_name": "crc", "algorithm": "crc16-modbus", "byte_length": 2 }
//! ]
//! ```
//!
//! ## Usage
//!
//! See `tests/integration.rs` for full examples and the `check_schema` binary
//! for a command-line validator.

pub mod checksum;
pub mod config;
pub mod dump;
pub mod field;
pub mod parser;
pub mod transform;
pub mod tree;
pub mod validate;
pub mod value;

pub use config::{ConfigError, EngineConfig};
pub use field::{is_container, new_field, FieldId, FieldKind, FieldNode, FieldType};
pub use parser::{parse_discriminant, parse_field_ref, Discriminant, FieldRef, ParseError};
pub use transform::{
    canonical_json, parse_schema, to_canonical, to_canonical_schema, to_editing, to_editing_schema,
    CanonicalNode, SchemaError,
};
pub use tree::{EditError, FieldTree, FlatEntry, FlatField};
pub use validate::{format_violations, validate, validate_schema, Problem, Violation};
pub use value::Scalar;
