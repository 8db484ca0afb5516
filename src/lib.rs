pub mod app;
pub mod auth;
pub mod backup;
pub mod config;
pub mod error;
pub mod seeder;
pub mod state;
pub mod workflow;
pub mod models {
    pub mod asset;
    pub mod faculty;
    pub mod notification;
    pub mod record;
    pub mod user;
}
pub mod db {
    pub mod notification_repository;
    pub mod session_repository;
    pub mod staged_repository;
    pub mod stock_repository;
    #[cfg(test)]
    pub mod memory;
}
pub mod storage {
    pub mod client;
}
pub mod api {
    pub mod assets;
    pub mod backup;
    pub mod dashboard;
    pub mod errors;
    pub mod faculty;
    pub mod notifications;
    pub mod staged;
    pub mod upload;
    pub mod users;
}
