pub mod error_detail;
pub mod request_id;

pub use error_detail::error_detail_middleware;
pub use request_id::request_id_middleware;
