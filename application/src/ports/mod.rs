//! Port definitions for the application layer
//!
//! Ports define the interfaces that the application layer uses to interact
//! with external systems. Implementations (adapters) live in the
//! infrastructure layer.

pub mod escalation;
pub mod event_bus;
pub mod llm_gateway;
pub mod observer;
