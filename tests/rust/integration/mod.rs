//! Integration tests - full compilations through the public API
//!
//! Each test loads its schema from YAML, compiles a request with
//! `cypher_compiler::compile` and checks the emitted text and parameters.

mod authorization_tests;
mod mutation_tests;
mod read_tests;
mod schema_loading_tests;
mod test_schemas;
