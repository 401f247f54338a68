//! Integration tests: full query and evaluation flows against the HTTP
//! backend (mocked) and the in-memory backend.

mod elasticsearch_flow;
mod evaluation;
mod in_memory_flow;
