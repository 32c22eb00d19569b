pub mod command;
pub mod stage;
pub mod storage;
pub mod upload;
