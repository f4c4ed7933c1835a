pub mod json_loader;

pub use json_loader::{
    load_all_json_files, load_json_source, parse_segments, segments_to_chunks, RawTextSegment,
};
