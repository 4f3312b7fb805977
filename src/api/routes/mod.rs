pub mod data;
pub mod health;
pub mod images;
pub mod uploads;
