pub mod cli;
pub mod receiver;
