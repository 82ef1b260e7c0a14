//! Application services layer.

pub mod auth;
pub mod comments;
pub mod content;
pub mod error;
pub mod gate;
pub mod posts;
pub mod repos;
pub mod seo;
pub mod session;
pub mod site;
pub mod sitemap;
pub mod slugs;
