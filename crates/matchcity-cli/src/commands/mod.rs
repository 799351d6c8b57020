pub mod init;
pub mod maintenance;
pub mod records;
pub mod sync;
