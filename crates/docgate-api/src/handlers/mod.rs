pub mod actions;
pub mod documents;
pub mod health;
