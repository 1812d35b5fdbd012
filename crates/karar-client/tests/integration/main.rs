mod client_tests;
mod common;
