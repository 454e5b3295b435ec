// Common utilities and shared types used across the application

pub mod error;
