// Engine / platform state: listing, parsing and per-project filtering.

mod parse;
mod query;
mod records;
mod table;

pub use parse::parse_json_lines;
pub use query::{ResourceQuery, filter_project_containers, filter_project_images};
pub use records::{ContainerRecord, ImageRecord, PodRecord};
pub use table::render_table;
