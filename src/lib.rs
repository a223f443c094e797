pub mod api;
pub mod config;
pub mod db;
pub mod hooks;
pub mod notify;
pub mod realtime;
pub mod settings;
pub mod vision;
pub mod weather;

#[cfg(test)]
mod stub;
