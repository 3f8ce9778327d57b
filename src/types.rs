pub mod identity;
pub mod notification;
pub mod push;
pub mod records;
