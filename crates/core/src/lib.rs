pub mod config;
pub mod domain;
pub mod error;
pub mod seedlist;

pub use config::Config;
pub use domain::*;
pub use error::*;
pub use seedlist::{parse_seed_list, SeedEntry};
