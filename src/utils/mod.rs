pub mod cancel;
pub mod collection_ext;

pub use cancel::CancelToken;
pub use collection_ext::group_by;
