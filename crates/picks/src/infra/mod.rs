pub mod db;
pub mod feed;

// Mock feed only available with e2e-testing feature or debug builds
#[cfg(any(feature = "e2e-testing", debug_assertions))]
pub mod feed_mock;
