pub mod dispatcher;
pub mod renderer;

pub use dispatcher::{DeliveryOutcome, DigestDispatcher, DigestError, DigestReport, DispatchSettings};
pub use renderer::{french_date, DigestRenderer, RenderedDigest};
