pub mod calendar;
pub mod db_utils;
pub mod department_cache;
pub mod ml;
pub mod scheduler;
pub mod settings_cache;
