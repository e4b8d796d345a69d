//! Generic entity model.
//!
//! # Responsibility
//! - Describe tables declaratively (`EntityDescriptor`).
//! - Hold row values in a typed, dynamic value store (`Entity`, `Value`).
//! - Expose ownership/permission semantics for owned entities.
//!
//! # Invariants
//! - Descriptors are immutable once built and shared through `Arc`.
//! - Persistence semantics are chosen by `EntityKind`, never by probing.

pub mod column;
pub mod descriptor;
pub mod entity;
pub mod object;
pub mod value;
