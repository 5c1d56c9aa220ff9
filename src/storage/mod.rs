pub mod db;
pub mod models;
mod posts;
mod repository;
mod tables;

pub use db::{Database, DatabaseError};
pub use repository::{PostRepository, RepositoryError};
pub use tables::*;
