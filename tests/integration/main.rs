//! API integration tests over the in-memory store

mod auth_flow;
mod common;
mod loan_flow;
