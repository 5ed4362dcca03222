pub mod diagnosis;
pub mod error;
pub mod evidence;
pub mod step;
