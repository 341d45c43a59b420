pub mod access;
pub mod connection;
pub mod migrations;
pub mod repositories;

pub use access::{AccessControl, AccessControlError};
pub use connection::{connect_and_migrate, connect_with_settings, ConnectError, DbPool};
pub use repositories::{
    AdminRepository, GradeRepository, InMemoryStore, RepositoryError, SqlAdminRepository,
    SqlGradeRepository, SqlStudentRepository, StudentDeletion, StudentRepository,
};
