pub mod chat;
pub mod medicine;
