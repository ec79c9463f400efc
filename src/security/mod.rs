pub mod command_executor;
pub mod token_manager;

pub use command_executor::{CommandError, ProcessRunner, sanitize_stderr};
pub use token_manager::{SecretMasker, mask_token};
