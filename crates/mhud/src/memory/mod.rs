pub mod layout;
mod process;
mod reader;

#[cfg(test)]
pub mod mock;

pub use layout::{GameLayout, load_layout, save_layout};
pub use process::*;
pub use reader::{MemoryReader, ReadMemory, WriteMemory};

#[cfg(test)]
pub use mock::{
    MockMemoryBuilder, MockMemoryReader, PeImageBuilder, game_image, list_code, manager_code,
};
