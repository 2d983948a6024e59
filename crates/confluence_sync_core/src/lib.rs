pub mod client;
pub mod config;
pub mod download;
pub mod extract;
pub mod filesystem;
pub mod selection;
pub mod space;
pub mod upload;

#[cfg(test)]
mod testing;
