pub mod cache_store;
pub mod preloader;
pub mod progressive_loader;
pub mod random_selector;

pub use cache_store::CacheStore;
pub use preloader::{Preloader, preload_order};
pub use progressive_loader::{BatchSink, LoadStage, LoaderHandle, ProgressiveLoader};
pub use random_selector::{RandomSelector, Selection, SelectionOrigin};
