pub mod client;
pub mod credentials;
pub mod dto;
pub mod ecs;
pub mod manager;
