//! Integration tests for sintegra-queue
//!
//! These tests run the producer, the status store, the queue and the worker
//! against real SQLite files in a temporary directory, with wiremock standing
//! in for the registry.

mod common;
mod pipeline_tests;
mod worker_tests;
