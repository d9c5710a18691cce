pub mod db;
pub mod geom;
pub mod tech;
pub mod util;
