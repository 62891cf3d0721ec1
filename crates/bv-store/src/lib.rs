pub mod config;
pub mod content;
pub mod error;
pub mod schema;
pub mod starmap;
pub mod store;

pub use config::{
    BLOBS_FILE, CONFIG_FILE, STARMAP_FILE, default_base_dir, load_config, resolve_data_dir,
};
pub use content::{ContentStore, content_id};
pub use error::{Result, StoreError};
pub use starmap::{Change, StarMap};
pub use store::Store;
