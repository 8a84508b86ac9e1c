pub mod connector;
pub mod db;
pub mod mail;
pub mod payment;
pub mod progress;
pub mod storage;
