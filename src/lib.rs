pub mod audit;
pub mod auth;
pub mod concepts;
pub mod db;
pub mod dictionary;
pub mod domains;
pub mod login;
pub mod model;
pub mod neo;
pub mod register;
pub mod review;
pub mod schema;
pub mod terms;
pub mod utils;
