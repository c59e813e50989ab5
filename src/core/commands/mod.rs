// Core bot command module - mention filter, command table and the polling loop.

pub mod command_models;
pub mod command_service;

pub use command_models::*;
pub use command_service::*;
