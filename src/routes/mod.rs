pub mod access;
pub mod auth;
pub mod health;
pub mod rbac;
