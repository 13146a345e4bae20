pub mod health;
pub mod hook;
