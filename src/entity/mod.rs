pub mod attend;
pub mod micropost;
pub mod relationship;
pub mod user;
