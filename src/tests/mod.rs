// Cross-module integration tests. Each test builds a scratch repository
// under a TempDir with a `var/` directory so storage resolves to the project
// scope and tests stay isolated from each other and from the host.

pub mod helpers;
pub mod indexer_tests;
