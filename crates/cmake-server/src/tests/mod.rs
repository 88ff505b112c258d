//! Crate-level session tests and behaviour scenarios.

pub(crate) mod support;
