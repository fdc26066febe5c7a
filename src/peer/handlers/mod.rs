pub mod advertise;
pub mod join;
pub mod message;
pub mod register;
pub mod reunion;
