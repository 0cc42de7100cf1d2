pub mod db_utils;
pub mod directory_index;
pub mod pagination;
pub mod upload_policy;
