//! Task routes: submit, list, status/download, delete.

pub mod delete;
pub mod dto;
pub mod list;
pub mod status;
pub mod submit;
pub mod upload;
