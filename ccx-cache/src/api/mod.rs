//! HTTP API handlers for ccx-cache

pub mod countries;
pub mod health;
pub mod status;

pub use countries::{
    delete_country, get_country, get_image, list_countries, refresh_countries,
};
pub use health::{health_routes, root};
pub use status::get_status;
