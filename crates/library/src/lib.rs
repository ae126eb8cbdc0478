pub mod index;
pub mod mapping;
pub mod naming;
pub mod resolve;

pub use index::{index_objects, LibraryIndex, LibraryStats};
pub use mapping::FolderMapping;
pub use naming::parse_folder_name;
pub use resolve::{resolve_candidates, MatchTier, Resolution, RetrievalRequest};
