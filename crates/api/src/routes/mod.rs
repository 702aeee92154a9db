pub mod about;
pub mod health;
