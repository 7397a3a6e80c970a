pub mod download;
pub mod opensubtitles;
pub mod xmlrpc;
