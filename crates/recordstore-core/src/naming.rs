//! Storage entity naming.
//!
//! Record type names are identifier style (`TreeData`, `HTTPRequest`); the
//! backing table or collection uses the lowercase, underscore separated
//! form. Distinct type names are assumed not to collide after conversion;
//! this is not checked.

use convert_case::{Case, Casing};

/// Derives the canonical storage entity name for a record type name.
///
/// ```
/// use recordstore_core::entity_name;
///
/// assert_eq!(entity_name("TreeData"), "tree_data");
/// assert_eq!(entity_name("Taxonomy"), "taxonomy");
/// ```
pub fn entity_name(type_name: &str) -> String {
    type_name.to_case(Case::Snake)
}
