pub mod catalog;
pub mod forms;
