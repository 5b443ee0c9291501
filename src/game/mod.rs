pub mod constants;
pub mod grid;
pub mod input;
pub mod room;
pub mod state;
pub mod types;
