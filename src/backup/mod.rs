pub mod backup_config;
pub mod exclusion;
pub mod retention;
pub mod slug;
pub mod tar;
pub mod validate;
