//! Database models, one file per table.
//! Everything is re-exported at `crate::db::models` so callers can use
//! `use crate::db::models::*;`.

pub mod date_remark;
pub mod employee;
pub mod leave_request;
pub mod org_unit;
pub mod shift;
pub mod template;

pub use self::date_remark::*;
pub use self::employee::*;
pub use self::leave_request::*;
pub use self::org_unit::*;
pub use self::shift::*;
pub use self::template::*;
