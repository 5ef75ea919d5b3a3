//! 回传：事件 → profile 解析 → 请求渲染 → 投递与重试 → 投递日志

pub mod dispatcher;
pub mod event;
pub mod filter;
pub mod queue;
pub mod request;
pub mod scope;
pub mod signing;
pub mod template;
pub mod transport;

pub use dispatcher::{DeliveryOutcome, DispatchSettings, DispatchSummary, Dispatcher};
pub use event::{LP_CLICK_EVENT, OPEN_EVENT, PostbackEvent};
pub use queue::{DispatchQueue, PostbackSink};
pub use request::PreparedRequest;
pub use scope::CallerRole;
pub use transport::{PostbackTransport, TransportResponse, UreqTransport};
