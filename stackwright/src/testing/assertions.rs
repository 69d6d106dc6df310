//! Assertions over recorded provider calls.

use super::fakes::FakeProvider;
use crate::parameters::ResolvedParameter;
use crate::provider::StackMutation;

/// Asserts that no call changed remote state.
pub fn assert_no_mutations(provider: &FakeProvider) {
    let mutations: Vec<_> = provider.calls().into_iter().filter(|c| c.is_mutation()).collect();
    assert!(
        mutations.is_empty(),
        "Expected no mutating calls, got: {mutations:?}"
    );
}

/// Asserts that a mutation carries exactly `expected`, in order.
pub fn assert_parameters(mutation: &StackMutation, expected: &[ResolvedParameter]) {
    assert_eq!(
        mutation.parameters, expected,
        "Unexpected parameters for stack '{}'",
        mutation.stack_name
    );
}

/// Returns the only mutation in `mutations`, failing otherwise.
pub fn single(mutations: Vec<StackMutation>) -> StackMutation {
    assert_eq!(mutations.len(), 1, "Expected exactly one mutation, got {mutations:?}");
    mutations.into_iter().next().unwrap_or_else(|| unreachable!())
}
