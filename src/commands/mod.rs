pub mod apply;
pub mod list;
pub mod serve;
