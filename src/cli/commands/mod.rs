mod check_config;
mod init;

pub use check_config::cmd_check_config;
pub use init::cmd_init;
