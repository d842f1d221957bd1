// Integration test module organization

pub mod common;

mod concurrency_test;
mod lifecycle_test;
mod roundtrip_test;
mod tamper_test;
