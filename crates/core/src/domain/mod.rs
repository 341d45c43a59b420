pub mod admin;
pub mod grade;
pub mod identity;
pub mod roster;
pub mod student;
