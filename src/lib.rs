use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub mod catalog;
pub mod common;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod songplays;
pub mod source;
pub mod table;
pub mod time;
pub mod writer;
