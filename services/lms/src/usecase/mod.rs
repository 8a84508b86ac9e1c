pub mod access;
pub mod analytics;
pub mod announcement;
pub mod badge;
pub mod course;
pub mod credential;
pub mod dashboard;
pub mod locks;
pub mod payment;
pub mod progress;
pub mod upload;
pub mod user;
