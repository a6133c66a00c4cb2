pub mod auth;
pub mod claim;
pub mod commands;
pub mod edge;
pub mod impersonation;
pub mod network;
pub mod platform;
pub mod revisions;
