pub mod completion;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod html;
pub mod io;
pub mod model;
pub mod redis;
pub mod retry;
pub mod rules;
pub mod scoring;
