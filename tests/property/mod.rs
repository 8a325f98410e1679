//! Property-based tests for policy and escaping guarantees

mod csp_policy;
mod escaping;
