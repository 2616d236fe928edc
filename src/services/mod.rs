//! services/mod.rs
//! Módulo que agrupa las capas de negocio del motor de campañas.

pub mod campaign_service;
pub mod command_service;
pub mod contact_store;
pub mod event_hub;
pub mod gateway_session;
pub mod list_loader;
pub mod pacing;
pub mod phone_normalizer;
pub mod progress_reporter;
pub mod recency_guard;
pub mod record_mapper;
pub mod run_tracker;
pub mod send_dispatcher;
pub mod session_registry;
pub mod tenant_files;
