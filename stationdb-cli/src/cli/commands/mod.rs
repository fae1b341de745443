pub mod download;
pub mod generic;
pub mod import;
pub mod info;
pub mod init;
pub mod list;
pub mod manage;
pub mod search;
