pub mod binding;
pub mod template;
