//! config/mod.rs
//! Configuración del servicio y tabla de alias de columnas.

pub mod campaign_config;
pub mod field_mapping;
