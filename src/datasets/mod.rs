pub mod dynamic;
pub mod folder;
pub mod labels;
