pub mod panels;
pub mod semantic_map;
pub mod toolbar;
pub mod view_state;
