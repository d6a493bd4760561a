pub mod health;
pub mod tours;
