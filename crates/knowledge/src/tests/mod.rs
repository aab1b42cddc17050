//! Cross-module retrieval, confidence and service tests.

mod properties;
mod qa_service;
mod retrieval;
