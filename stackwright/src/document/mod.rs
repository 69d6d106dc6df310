//! The rendered stack document and its typed views.
//!
//! The template builder produces the document; the engine only reads it:
//! the serialized body goes to the provider unchanged, and the typed
//! [`ParameterDeclaration`] view drives diagnostics.

mod declaration;
mod stack_document;
mod validation;

pub use declaration::ParameterDeclaration;
pub use stack_document::StackDocument;
pub use validation::{collect_violations, render_path, PathSegment, NULL_VALUE_MESSAGE};
