pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod logging;
pub mod mappings;
pub mod pipeline;
pub mod table;
