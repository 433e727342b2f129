mod index_tests;
mod prop_invariant_tests;
mod recovery_tests;
mod scenario_tests;
mod test_utils;
mod traversal_tests;
