pub mod fixtures;
pub mod test_env;

// Re-export key testing utilities
pub use fixtures::{Universe, load_universe};
pub use test_env::TestEnvironment;
