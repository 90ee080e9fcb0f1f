pub mod analysis;
pub mod business;
pub mod evidence;
pub mod persona;
pub mod report;
