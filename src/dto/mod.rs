pub mod admin;
pub mod disputes;
pub mod eco;
pub mod orders;
