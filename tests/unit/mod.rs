pub mod auth_tests;
pub mod config_tests;
pub mod error_tests;
pub mod response_tests;
