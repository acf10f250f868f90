//! Forwarded-header dispatch and the three storage-array family handlers
//! (`spec.md` §4.2, §4.5, §6).

pub mod dispatch;
pub mod extract;
pub mod forwarded;
pub mod pool_cache;
pub mod route;
pub mod session;

pub use dispatch::{ArrayHandler, Decision, DispatchHandler, RequestContext};
pub use forwarded::ForwardedTarget;
pub use route::InterceptedRoute;
