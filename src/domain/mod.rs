pub mod chat;
pub mod shared;
pub mod usage;
pub mod visitor;
pub mod voice;
