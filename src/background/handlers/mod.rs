pub mod api_handlers;
pub mod page_handlers;
pub mod settings_handlers;

pub use api_handlers::product_id_from_url;
