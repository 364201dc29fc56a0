mod reactor;

pub use reactor::TokioReactor;

#[inline(always)]
pub fn available() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}
