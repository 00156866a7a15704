//! Admin dashboard state
//!
//! The state model behind the admin area: filtered views, lists patched
//! from the change feed and optimistic edits that roll back when the
//! server says no. Single-threaded; nothing here locks. The `/admin` page
//! renders from a [`DashboardSession`] and `static/js/admin.js` applies the
//! same patch and rollback rules in the browser.

pub mod filter;
pub mod live;
pub mod optimistic;
pub mod session;

pub use filter::{BookingFilter, Filter, PostFilter};
pub use live::{LiveList, Record};
pub use optimistic::{Mutation, OptimisticList, PendingChange};
pub use session::{AdminBackend, DashboardSession, ServiceBackend};
