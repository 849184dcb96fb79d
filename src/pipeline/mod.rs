pub mod adapters;
pub mod cancel;
pub mod config;
pub mod observe;
pub mod retry;
pub mod runtime;
pub mod stage;
