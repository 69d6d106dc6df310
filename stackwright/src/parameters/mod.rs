//! Parameter inputs, cross-stack lookups and resolution.
//!
//! This module provides:
//! - [`ParameterInputs`] for merging file, flag and argument inputs
//! - [`OutputLookup`], the `@stack.output` reference grammar
//! - [`ParameterResolver`], which turns declarations plus inputs into the
//!   parameter list submitted to the provider

mod inputs;
mod lookup;
mod resolved;
mod resolver;

pub use inputs::{split_assignment, ParameterInputs};
pub use lookup::OutputLookup;
pub use resolved::{ParameterValue, ResolvedParameter};
pub use resolver::ParameterResolver;
