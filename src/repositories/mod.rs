//! Repository layer for database operations.
//!
//! This module provides repository structs that encapsulate database queries
//! and operations, following the Data Mapper pattern recommended by SeaORM.
//! Repositories keep entities as pure data models while providing reusable
//! database access methods.

pub mod mapping;
pub mod tag;
pub mod task;

pub use mapping::MappingRepository;
pub use tag::TagRepository;
pub use task::TaskRepository;
