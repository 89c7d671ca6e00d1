pub mod db_utils;
pub mod repositories;

#[cfg(feature = "fake")]
pub mod fake;
