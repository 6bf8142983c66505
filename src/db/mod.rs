//! Persistence side of the channels API: identifiers, domain models,
//! SeaORM entities, the store abstraction and the channel repository.

pub mod entities;
pub mod models;
pub mod object_id;
pub mod repository;
pub mod schema;
pub mod store;
