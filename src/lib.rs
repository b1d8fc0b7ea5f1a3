pub mod common;
pub mod manager;
pub mod mode;
pub mod model;
pub mod settings;

#[cfg(test)]
mod testing;
