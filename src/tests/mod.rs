//! tests/mod.rs
//! Pruebas unitarias del motor de campañas.

mod support;

mod dispatcher_tests;
mod mapping_tests;
mod phone_tests;
mod session_tests;
