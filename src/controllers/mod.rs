pub mod chat;
pub mod health;
pub mod usage;
pub mod voice;
