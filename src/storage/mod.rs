pub mod disk;
pub mod engine;
pub mod keycode;
pub mod memory;
